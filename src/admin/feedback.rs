use crate::api::types::NewFeedbackTitle;
use crate::error::{ClientError, Result};

/// Minimum length of a feedback title, in characters, after trimming.
pub const MIN_TITLE_LEN: usize = 10;

/// Validate a feedback title create before anything is sent.
pub fn new_feedback_title(title: &str, major: Option<bool>) -> Result<NewFeedbackTitle> {
  let title = title.trim();
  let len = title.chars().count();
  if len < MIN_TITLE_LEN {
    return Err(ClientError::validation(format!(
      "Title must be at least {} characters (got {})",
      MIN_TITLE_LEN, len
    )));
  }
  Ok(NewFeedbackTitle {
    title: title.to_string(),
    major,
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_min_length_boundary() {
    assert!(new_feedback_title("123456789", None).is_err());
    let ok = new_feedback_title("1234567890", Some(true)).unwrap();
    assert_eq!(ok.title, "1234567890");
    assert_eq!(ok.major, Some(true));
  }

  #[test]
  fn test_whitespace_does_not_count() {
    let err = new_feedback_title("   short    ", None).unwrap_err();
    assert_eq!(
      err,
      ClientError::validation("Title must be at least 10 characters (got 5)")
    );
  }

  #[test]
  fn test_counts_characters_not_bytes() {
    assert!(new_feedback_title("Überprüfen", None).is_ok());
    assert!(new_feedback_title("Überprüf", None).is_err());
  }
}
