use std::fmt::Write;

use crate::{recorder::HistoryRow, session::SessionResult};

pub const INDEX: &str = r#"<!doctype html>
<html>
<head><meta charset="utf-8"><title>Fitness Assessment</title></head>
<body>
<h1>Fitness Assessment</h1>
<form id="start">
  <label>Gender
    <select name="gender"><option value="male">Male</option><option value="female">Female</option></select>
  </label>
  <label>Exercise
    <select name="exercise">
      <option value="pushups">Push-ups</option>
      <option value="squats">Squats</option>
      <option value="crunches">Crunches</option>
    </select>
  </label>
  <label>Duration (s) <input name="duration" type="number" min="1" value="60"></label>
  <button type="submit">Start</button>
</form>
<p><a href="/dashboard">History</a></p>
<script>
document.getElementById("start").addEventListener("submit", async (event) => {
  event.preventDefault();
  const form = new FormData(event.target);
  const body = {
    gender: form.get("gender"),
    exercise: form.get("exercise"),
    duration: Number(form.get("duration")),
  };
  const response = await fetch("/start_test", {
    method: "POST",
    headers: { "Content-Type": "application/json" },
    body: JSON.stringify(body),
  });
  if (response.ok) {
    window.location = "/workout";
  } else {
    alert("Invalid parameters");
  }
});
</script>
</body>
</html>
"#;

pub const WORKOUT: &str = r#"<!doctype html>
<html>
<head><meta charset="utf-8"><title>Workout</title></head>
<body>
<h1 id="timer">Get ready</h1>
<img src="/video_feed" alt="camera feed">
<script>
let seenActive = false;
setInterval(async () => {
  const status = await (await fetch("/status")).json();
  if (status.active) {
    seenActive = true;
    document.getElementById("timer").textContent = `${status.remaining_secs}s left`;
  } else if (seenActive) {
    window.location = "/results";
  }
}, 500);
</script>
</body>
</html>
"#;

pub fn results(result: &SessionResult) -> String {
    let (normal, athlete) = match result.averages {
        Some(averages) => (averages.normal.to_string(), averages.athlete.to_string()),
        None => ("n/a".to_string(), "n/a".to_string()),
    };
    format!(
        r#"<!doctype html>
<html>
<head><meta charset="utf-8"><title>Results</title></head>
<body>
<h1>{exercise} results</h1>
<table>
<tr><th>Gender</th><td>{gender}</td></tr>
<tr><th>Reps</th><td>{reps}</td></tr>
<tr><th>Duration</th><td>{duration}s</td></tr>
<tr><th>Normal average</th><td>{normal}</td></tr>
<tr><th>Athlete average</th><td>{athlete}</td></tr>
</table>
<p><a href="/">New test</a> | <a href="/dashboard">History</a></p>
</body>
</html>
"#,
        exercise = result.exercise.display_name(),
        gender = result.gender,
        reps = result.reps,
        duration = result.duration_secs,
    )
}

pub fn dashboard(rows: &[HistoryRow]) -> String {
    let mut body = String::new();
    for row in rows {
        let _ = writeln!(
            body,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            escape(&row.timestamp),
            escape(&row.gender),
            escape(&row.exercise),
            row.reps,
            row.duration_secs,
        );
    }
    format!(
        r#"<!doctype html>
<html>
<head><meta charset="utf-8"><title>History</title></head>
<body>
<h1>Workout history</h1>
<table>
<tr><th>Date</th><th>Gender</th><th>Exercise</th><th>Reps</th><th>Duration (s)</th></tr>
{body}</table>
<p><a href="/">New test</a></p>
</body>
</html>
"#
    )
}

/// History rows come from a user-editable file.
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}
