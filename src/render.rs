//! Plain-text cards for response records

use crate::{Metadata, RateLimit, ResponseRecord};

/// Upper-case the first character of a model name
pub fn capitalize_model_name(name: &str) -> String
{   let mut chars = name.chars();
    match chars.next()
    {   Some(first) => first.to_uppercase().chain(chars).collect()
      , None => String::new()
    }
}

/// Label for the health indicator
pub fn health_label(healthy: Option<bool>) -> &'static str
{   match healthy
    {   Some(true) => "Backend: healthy"
      , Some(false) => "Backend: unreachable"
      , None => "Backend: checking..."
    }
}

/// One card per record, separated by blank lines
pub fn render_records(records: &[ResponseRecord], show_metadata: bool)
  -> String
{   records.iter()
      .map(|r| render_card(r, show_metadata))
      .collect::<Vec<_>>()
      .join("\n")
}

pub fn render_card(record: &ResponseRecord, show_metadata: bool)
  -> String
{   let mut content = String::new();
    content.push_str(&format!(
      "=== {} ===\n",
      capitalize_model_name(&record.model_display_name)
    ));

    if record.is_pending
    {   content.push_str("Waiting for response...\n");
    } else if let Some(err) = &record.error_message
    {   content.push_str(&format!("Error: {}\n", err));
        if let Some(answer) = &record.answer_text
        {   content.push_str(&format!("{}\n", answer));
        }
    } else if let Some(answer) = &record.answer_text
    {   content.push_str(&format!("{}\n", answer));
    } else
    {   content.push_str("No response yet\n");
    }

    if show_metadata
    {   if let Some(meta) = &record.metadata
        {   write_metadata(&mut content, meta);
        }
    }
    content
}

fn write_metadata(content: &mut String, meta: &Metadata)
{   content.push_str("--- metadata ---\n");
    content.push_str(&format!(
      "Tokens: prompt {} / generation {} / total {}\n",
      or_dash(meta.prompt_tokens),
      or_dash(meta.generation_tokens),
      or_dash(meta.total_tokens)
    ));
    if let Some(ms) = meta.response_time_ms
    {   content.push_str(&format!("Response time: {} ms\n", ms));
    }
    if let Some(model) = &meta.model_version
    {   content.push_str(&format!("Model: {}\n", model));
    }
    if let Some(reason) = &meta.finish_reason
    {   content.push_str(&format!("Finish reason: {}\n", reason));
    }
    content.push_str(&format!("Timestamp: {}\n", meta.timestamp));
    if let Some(limits) = &meta.rate_limit
    {   write_rate_limit(content, limits);
    }
}

fn write_rate_limit(content: &mut String, limits: &RateLimit)
{   content.push_str(&format!(
      "Rate limit: requests {}/{}, tokens {}/{}",
      or_dash(limits.remaining),
      or_dash(limits.limit),
      or_dash(limits.tokens_remaining),
      or_dash(limits.tokens_limit)
    ));
    if let Some(secs) = limits.reset_after_seconds
    {   content.push_str(&format!(", resets in {}s", secs));
    }
    content.push('\n');
}

fn or_dash(value: Option<u64>) -> String
{   value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

#[cfg(test)]
mod tests
{   use super::*;
    use crate::ModelDescriptor;

    #[test]
    fn capitalizes_first_letter_only()
    {   assert_eq!(capitalize_model_name("gpt-4o"), "Gpt-4o");
        assert_eq!(capitalize_model_name(""), "");
        assert_eq!(capitalize_model_name("élan"), "Élan");
    }

    #[test]
    fn pending_and_error_cards()
    {   let blank = ResponseRecord::blank(
          &ModelDescriptor::new("m", "mistral")
        );
        let pending = ResponseRecord { is_pending: true, ..blank.clone() };
        assert!(render_card(&pending, false).contains("Waiting"));

        let failed = ResponseRecord
        {   error_message: Some("boom".to_string())
          , ..blank
        };
        let card = render_card(&failed, true);
        assert!(card.starts_with("=== Mistral ==="));
        assert!(card.contains("Error: boom"));
        assert!(!card.contains("metadata"));
    }

    #[test]
    fn metadata_section_only_when_asked()
    {   let record = ResponseRecord
        {   answer_text: Some("42".to_string())
          , metadata: Some(Metadata
            {   total_tokens: Some(7)
              , timestamp: "t0".to_string()
              , rate_limit: Some(RateLimit
                {   remaining: Some(3)
                  , ..RateLimit::default()
                })
              , ..Metadata::default()
            })
          , ..ResponseRecord::blank(&ModelDescriptor::new("a", "a"))
        };
        assert!(!render_card(&record, false).contains("Tokens"));
        let card = render_card(&record, true);
        assert!(card.contains("total 7"));
        assert!(card.contains("requests 3/-"));
    }
}
