//! Parameter synthesis: turn a model's parameter specs, a user prompt and
//! an optional input-media reference into a concrete argument list.

use crate::schema::{ParamKind, ParameterSpec};

/// Field names that carry the user's prompt, matched case-insensitively.
const PROMPT_FIELD_NAMES: [&str; 5] = ["prompt", "text", "input_text", "message", "query"];

/// Build an ordered argument list for a generation request.
///
/// Rules, applied in spec order:
/// - the first file-like field receives `[input_media]` when media is
///   available; further file-like fields are skipped,
/// - a prompt-named field, or the first textarea while the prompt is still
///   unassigned, receives the user prompt exactly once,
/// - everything else takes its declared default, else the first non-empty
///   option value, else is omitted.
///
/// If no field received the prompt a literal `prompt` field is appended,
/// so the remote call always carries the user's intent.
pub fn synthesize(
    specs: &[ParameterSpec],
    prompt: &str,
    input_media: Option<&str>,
) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = Vec::new();
    let mut prompt_assigned = false;
    let mut media_assigned = false;

    for spec in specs {
        if spec.kind == ParamKind::FileLike {
            if let Some(media) = input_media {
                if !media_assigned {
                    params.push((spec.name.clone(), format!("[\"{}\"]", media)));
                    media_assigned = true;
                }
            }
            continue;
        }

        let name_lower = spec.name.to_lowercase();
        let is_prompt_name = PROMPT_FIELD_NAMES.contains(&name_lower.as_str());
        if !prompt_assigned && (is_prompt_name || spec.kind == ParamKind::Textarea) {
            params.push((spec.name.clone(), prompt.to_string()));
            prompt_assigned = true;
            continue;
        }

        if !spec.default.is_empty() {
            params.push((spec.name.clone(), spec.default.clone()));
        } else if let Some(option) = spec.options.iter().find(|o| !o.value.is_empty()) {
            params.push((spec.name.clone(), option.value.clone()));
        }
    }

    if !prompt_assigned {
        params.push(("prompt".to_string(), prompt.to_string()));
    }

    params
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ParamOption;

    fn spec(name: &str, kind: ParamKind, default: &str) -> ParameterSpec {
        ParameterSpec {
            name: name.to_string(),
            label: String::new(),
            help: String::new(),
            kind,
            default: default.to_string(),
            options: Vec::new(),
            required: false,
        }
    }

    #[test]
    fn prompt_and_default() {
        let specs = vec![
            spec("prompt", ParamKind::Textarea, ""),
            spec("seed", ParamKind::Numeric, "42"),
        ];
        let params = synthesize(&specs, "a cat", None);
        assert_eq!(
            params,
            vec![
                ("prompt".to_string(), "a cat".to_string()),
                ("seed".to_string(), "42".to_string()),
            ]
        );
    }

    #[test]
    fn synthesized_prompt_when_no_prompt_like_field() {
        let specs = vec![spec("steps", ParamKind::Numeric, "20")];
        let params = synthesize(&specs, "a dog", None);
        assert!(params.contains(&("prompt".to_string(), "a dog".to_string())));
    }

    #[test]
    fn first_textarea_claims_prompt_once() {
        let specs = vec![
            spec("negative", ParamKind::Textarea, ""),
            spec("description", ParamKind::Textarea, "fallback"),
        ];
        let params = synthesize(&specs, "hello", None);
        // First textarea wins; the second takes its default.
        assert_eq!(params[0], ("negative".to_string(), "hello".to_string()));
        assert_eq!(params[1], ("description".to_string(), "fallback".to_string()));
    }

    #[test]
    fn media_fills_first_file_slot_only() {
        let specs = vec![
            spec("inputImage", ParamKind::FileLike, ""),
            spec("maskImage", ParamKind::FileLike, ""),
            spec("prompt", ParamKind::Textarea, ""),
        ];
        let params = synthesize(&specs, "animate this", Some("http://x/a.png"));
        assert_eq!(
            params[0],
            ("inputImage".to_string(), "[\"http://x/a.png\"]".to_string())
        );
        assert_eq!(params.iter().filter(|(n, _)| n.contains("Image")).count(), 1);
    }

    #[test]
    fn file_slots_skipped_without_media() {
        let specs = vec![
            spec("inputImage", ParamKind::FileLike, ""),
            spec("prompt", ParamKind::Textarea, ""),
        ];
        let params = synthesize(&specs, "p", None);
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].0, "prompt");
    }

    #[test]
    fn option_value_used_when_no_default() {
        let mut style = spec("style", ParamKind::Text, "");
        style.options = vec![
            ParamOption { value: String::new(), label: "None".to_string() },
            ParamOption { value: "anime".to_string(), label: "Anime".to_string() },
        ];
        let specs = vec![spec("prompt", ParamKind::Textarea, ""), style];
        let params = synthesize(&specs, "p", None);
        assert_eq!(params[1], ("style".to_string(), "anime".to_string()));
    }

    #[test]
    fn valueless_field_is_omitted() {
        let specs = vec![
            spec("prompt", ParamKind::Textarea, ""),
            spec("extra", ParamKind::Text, ""),
        ];
        let params = synthesize(&specs, "p", None);
        assert_eq!(params.len(), 1);
    }
}
