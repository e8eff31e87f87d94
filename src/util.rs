//! Small utility helpers used across modules.

use serde::Serialize;

/// Very small and safe string templating.
/// Replaces occurrences of `{key}` in the template with provided values.
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
  let mut out = tpl.to_string();
  for (k, v) in pairs {
    let needle = format!("{{{}}}", k);
    out = out.replace(&needle, v);
  }
  out
}

/// Log-safe truncation for large strings (char-boundary aware).
pub fn trunc_for_log(s: &str, max_chars: usize) -> String {
  let total = s.chars().count();
  if total <= max_chars {
    s.to_string()
  } else {
    let head: String = s.chars().take(max_chars).collect();
    format!("{}… ({} chars total)", head, total)
  }
}

/// Strip code fences and keep the span between the first `{` and the last `}`.
/// Models like to wrap JSON in ```json fences or a sentence of prose.
pub fn extract_json_object(raw: &str) -> String {
  let cleaned = raw.replace("```json", "").replace("```", "");
  match (cleaned.find('{'), cleaned.rfind('}')) {
    (Some(open), Some(close)) if close > open => cleaned[open..=close].trim().to_string(),
    _ => cleaned.trim().to_string(),
  }
}

/// Piece of question text; `math` spans were written between backticks.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct TextSegment {
  pub text: String,
  pub math: bool,
}

/// Split `"Calculate `50 + 20` now"` into plain and formula segments.
/// An unmatched backtick is kept as plain text.
pub fn split_math_segments(text: &str) -> Vec<TextSegment> {
  let mut out = Vec::new();
  let mut rest = text;
  while let Some(open) = rest.find('`') {
    let after = &rest[open + 1..];
    let Some(close) = after.find('`') else { break };
    if close == 0 {
      // "``" is not a formula; emit it as text and move on.
      push_plain(&mut out, &rest[..open + 2]);
      rest = &after[1..];
      continue;
    }
    push_plain(&mut out, &rest[..open]);
    out.push(TextSegment { text: after[..close].to_string(), math: true });
    rest = &after[close + 1..];
  }
  push_plain(&mut out, rest);
  out
}

fn push_plain(out: &mut Vec<TextSegment>, s: &str) {
  if s.is_empty() {
    return;
  }
  match out.last_mut() {
    Some(last) if !last.math => last.text.push_str(s),
    _ => out.push(TextSegment { text: s.to_string(), math: false }),
  }
}
