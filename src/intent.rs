use crate::constants::{GEMINI_API_BASE, INTENT_TIMEOUT_SECS};
use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// the model endpoint refused the api key
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("api key was rejected (http {status})")]
pub struct KeyRejected {
    pub status: u16,
}

/// commit message and target branch extracted from a user instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Intent {
    pub commit_message: String,
    /// empty when the instruction didn't name a branch
    pub branch: String,
}

impl Intent {
    /// used when the model is unavailable or its answer is unusable
    pub fn fallback(input: &str) -> Self {
        Self {
            commit_message: fallback_message(input),
            branch: String::new(),
        }
    }
}

/// intent plus what we learned about the model response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub intent: Intent,
    pub response_len: usize,
    /// false when the response couldn't be parsed and the fallback was used
    pub parsed: bool,
}

pub fn get_prompt() -> String {
    r#"
You are an AI agent that runs git tasks.

RULES:
1. Respond ONLY with raw JSON. No code fences, comments or extra text.
2. Always use exactly this structure:
   {
     "status": "success",
     "content": {
       "action": "doall",
       "commitMsg": "<short commit message>",
       "branch": "<branch name or empty string>"
     }
   }
3. Interpret ANY input as a request to commit and push code.
4. Commit messages follow conventional commits: "type: description"
   - types: feat, fix, docs, style, refactor, test, chore
   - keep the description short (3-6 words)
   - examples: "feat: add user authentication", "fix: resolve login bug"
5. If the user names a branch, put it in "branch", otherwise use "".
6. Branch names never contain spaces.
"#
    .trim()
    .to_string()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<RequestContent>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct RequestContent {
    role: String,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

/// ask the model to turn `input` into a commit message and branch
///
/// network and http failures are errors; an unparseable answer is not,
/// it degrades to `Intent::fallback`
pub fn extract(api_key: &str, model: &str, input: &str) -> Result<Extraction> {
    let request = GenerateRequest {
        contents: vec![RequestContent {
            role: "user".to_string(),
            parts: vec![Part {
                text: format!("{}\n\nUser request: {input}", get_prompt()),
            }],
        }],
        generation_config: GenerationConfig {
            response_mime_type: "application/json".to_string(),
        },
    };

    let agent: ureq::Agent = ureq::Agent::config_builder()
        .timeout_global(Some(Duration::from_secs(INTENT_TIMEOUT_SECS)))
        .build()
        .into();
    let url = format!("{GEMINI_API_BASE}/{model}:generateContent");

    let mut response = match agent
        .post(&url)
        .header("x-goog-api-key", api_key)
        .send_json(&request)
    {
        Ok(response) => response,
        Err(ureq::Error::StatusCode(code)) => return Err(status_error(code)),
        Err(e) => bail!("model request failed: {e}"),
    };

    let body: GenerateResponse = response
        .body_mut()
        .read_json()
        .context("failed to decode model response")?;

    let text: String = body
        .candidates
        .into_iter()
        .filter_map(|c| c.content)
        .flat_map(|c| c.parts)
        .map(|p| p.text)
        .collect();

    Ok(interpret(&text, input))
}

/// gemini answers a bad or revoked key with 400, 401 or 403
fn status_error(code: u16) -> anyhow::Error {
    match code {
        400 | 401 | 403 => KeyRejected { status: code }.into(),
        _ => anyhow!("model request failed with http {code}"),
    }
}

/// turn raw model text into an intent, falling back field by field
pub fn interpret(text: &str, input: &str) -> Extraction {
    let parsed: Option<Value> = serde_json::from_str(&clean_json(text)).ok();

    let field = |name: &str| -> Option<String> {
        let value = parsed.as_ref()?;
        value
            .pointer(&format!("/content/{name}"))
            .or_else(|| value.get(name))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    let intent = Intent {
        commit_message: field("commitMsg").unwrap_or_else(|| fallback_message(input)),
        branch: field("branch").map(|b| clean_branch(&b)).unwrap_or_default(),
    };

    Extraction {
        intent,
        response_len: text.len(),
        parsed: parsed.is_some(),
    }
}

/// the instruction itself if it already looks like "type: description"
pub fn fallback_message(input: &str) -> String {
    let input = input.trim();
    if input.contains(':') {
        input.to_string()
    } else {
        format!("feat: {input}")
    }
}

/// strip code fences and trailing commas the model sometimes emits
pub fn clean_json(text: &str) -> String {
    let mut body = text.trim();
    if let Some(start) = body.find("```") {
        body = &body[start + 3..];
        if body.get(..4).is_some_and(|tag| tag.eq_ignore_ascii_case("json")) {
            body = &body[4..];
        }
        if let Some(end) = body.find("```") {
            body = &body[..end];
        }
    }
    strip_trailing_commas(body.trim())
}

fn strip_trailing_commas(json: &str) -> String {
    let chars: Vec<char> = json.chars().collect();
    let mut out = String::with_capacity(json.len());
    let mut in_string = false;
    let mut escaped = false;

    for (i, &c) in chars.iter().enumerate() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            ',' => {
                let next = chars[i + 1..].iter().copied().find(|ch| !ch.is_whitespace());
                if !matches!(next, Some('}' | ']')) {
                    out.push(c);
                }
            }
            _ => out.push(c),
        }
    }
    out
}

/// branch names never contain whitespace or start with a dash
fn clean_branch(branch: &str) -> String {
    branch
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .trim_start_matches('-')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_errors_are_distinguishable() {
        for code in [400, 401, 403] {
            let err = status_error(code);
            assert_eq!(
                err.downcast_ref::<KeyRejected>(),
                Some(&KeyRejected { status: code })
            );
        }
    }

    #[test]
    fn other_http_errors_are_not_key_errors() {
        for code in [404, 429, 500, 503] {
            let err = status_error(code);
            assert!(err.downcast_ref::<KeyRejected>().is_none());
            assert!(err.to_string().contains(&code.to_string()));
        }
    }

    #[test]
    fn interprets_wrapped_response() {
        let text = r#"{"status":"success","content":{"action":"doall","commitMsg":"fix: resolve login bug","branch":"hotfix"}}"#;
        let extraction = interpret(text, "fix the login");
        assert!(extraction.parsed);
        assert_eq!(
            extraction.intent,
            Intent {
                commit_message: "fix: resolve login bug".to_string(),
                branch: "hotfix".to_string(),
            }
        );
        assert_eq!(extraction.response_len, text.len());
    }

    #[test]
    fn interprets_flat_response() {
        let extraction = interpret(r#"{"commitMsg":"docs: update readme","branch":""}"#, "x");
        assert_eq!(extraction.intent.commit_message, "docs: update readme");
        assert_eq!(extraction.intent.branch, "");
    }

    #[test]
    fn tolerates_fences_and_trailing_commas() {
        let text = "```json\n{\"content\": {\"commitMsg\": \"feat: add search\", \"branch\": \"search\",},}\n```";
        let extraction = interpret(text, "x");
        assert!(extraction.parsed);
        assert_eq!(extraction.intent.commit_message, "feat: add search");
        assert_eq!(extraction.intent.branch, "search");
    }

    #[test]
    fn trailing_comma_inside_string_is_kept() {
        assert_eq!(
            strip_trailing_commas(r#"{"a": "x,}", "b": [1, 2,],}"#),
            r#"{"a": "x,}", "b": [1, 2]}"#
        );
    }

    #[test]
    fn garbage_falls_back_to_input() {
        let extraction = interpret("I can't help with that", "push my changes");
        assert!(!extraction.parsed);
        assert_eq!(
            extraction.intent,
            Intent {
                commit_message: "feat: push my changes".to_string(),
                branch: String::new(),
            }
        );
    }

    #[test]
    fn missing_message_falls_back_but_keeps_branch() {
        let extraction = interpret(r#"{"content":{"branch":"dev"}}"#, "fix: typo in docs");
        assert_eq!(extraction.intent.commit_message, "fix: typo in docs");
        assert_eq!(extraction.intent.branch, "dev");
    }

    #[test]
    fn fallback_keeps_conventional_input() {
        assert_eq!(fallback_message("chore: bump deps"), "chore: bump deps");
        assert_eq!(fallback_message("  bump deps "), "feat: bump deps");
    }

    #[test]
    fn branch_names_are_made_safe() {
        assert_eq!(clean_branch("feature login page"), "feature-login-page");
        assert_eq!(clean_branch("--force"), "force");
        assert_eq!(clean_branch("  release/1.2 "), "release/1.2");
    }

    #[test]
    fn message_with_quotes_survives() {
        let extraction = interpret(
            r#"{"content":{"commitMsg":"fix: escape \"quoted\" names","branch":""}}"#,
            "x",
        );
        assert_eq!(
            extraction.intent.commit_message,
            "fix: escape \"quoted\" names"
        );
    }
}
