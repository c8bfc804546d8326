//! Message intent detection
//!
//! Decides whether a free-text message is a command, a "send more" request
//! or a subject-code file request, and extracts the search keywords.

use lazy_regex::{lazy_regex, regex, regex_replace_all};
use regex::Regex;

static RE_MORE: lazy_regex::Lazy<Regex> =
    lazy_regex!(r"(?i)^(send )?(more|aur|next|baki|all|sab|sari)( files?)?$");
static RE_SUBJECT_CODE: lazy_regex::Lazy<Regex> = lazy_regex!(r"(?i)\b([A-Z]{2,4}\d{2,4})\b");
static RE_FILE_INTENT: lazy_regex::Lazy<Regex> = lazy_regex!(
    r"(?i)\b(file|files|note|notes|handout|handouts|paper|papers|quiz|assignment|gdb|solution|mid|final)\b"
);
static RE_DEMAND: lazy_regex::Lazy<Regex> = lazy_regex!(
    r"(?i)\b(send|give|want|need|chahiye|bhejo|share|upload|please|plz|kindly|me)\b"
);
static RE_ALL: lazy_regex::Lazy<Regex> =
    lazy_regex!(r"(?i)\b(all|sab|sari|everything|sara|sare|tamam)\b");

/// Messages up to this many words need no demand keyword
const SHORT_MESSAGE_WORDS: usize = 10;
/// Messages up to this many words need no file keyword either
const BARE_CODE_WORDS: usize = 3;

/// A detected file request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRequest {
    /// Upper-cased subject code
    pub subject_code: String,
    /// Remaining search keywords, space separated, possibly empty
    pub keywords: String,
    /// The user asked for every file
    pub all: bool,
}

/// Split a prefixed command into lower-cased name and arguments.
///
/// Both `prefix` and `.` are accepted.
#[must_use]
pub fn parse_command<'a>(text: &'a str, prefix: &str) -> Option<(String, Vec<&'a str>)> {
    let text = text.trim();
    let rest = if !prefix.is_empty() && text.starts_with(prefix) {
        &text[prefix.len()..]
    } else {
        text.strip_prefix('.')?
    };

    let mut parts = rest.split_whitespace();
    let name = parts.next()?.to_lowercase();
    Some((name, parts.collect()))
}

/// Returns true for "more", "send more", "aur files" and similar
#[must_use]
pub fn is_more_request(text: &str) -> bool {
    RE_MORE.is_match(text.trim())
}

/// First subject code in the text, upper-cased
#[must_use]
pub fn find_subject_code(text: &str) -> Option<String> {
    RE_SUBJECT_CODE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_uppercase())
}

/// Detect a subject-code file request.
///
/// Short messages (up to 10 words) qualify with a file keyword or when they
/// are at most 3 words. Longer messages need a file keyword and a demand
/// keyword, so chatter that merely mentions a course is ignored.
#[must_use]
pub fn detect_file_request(text: &str) -> Option<FileRequest> {
    let text = text.trim();
    let code_match = RE_SUBJECT_CODE.captures(text)?.get(0)?;

    let word_count = text.split_whitespace().count();
    let has_file_keyword = RE_FILE_INTENT.is_match(text);
    let is_request = if word_count <= SHORT_MESSAGE_WORDS {
        has_file_keyword || word_count <= BARE_CODE_WORDS
    } else {
        has_file_keyword && RE_DEMAND.is_match(text)
    };
    if !is_request {
        return None;
    }

    let without_code = text.replacen(code_match.as_str(), "", 1);
    Some(FileRequest {
        subject_code: code_match.as_str().to_uppercase(),
        keywords: extract_keywords(&without_code),
        all: RE_ALL.is_match(text),
    })
}

/// Strip conversational noise so only topic or author words remain
fn extract_keywords(text: &str) -> String {
    let text = regex_replace_all!(
        r"(?i)\b(send|give|want|need|chahiye|bhejo|share|upload|please|plz|kindly|me|us|mujhe|hamen|sir|mam|bhai|admin|bot|yaar|help|urgent|asap|jhat|file|files|pdf|doc|link|notes|handout|handouts|paper|papers|sol|solution)\b",
        text,
        ""
    );
    let text = regex!(r"[^\w\s]").replace_all(&text, "");
    let text = RE_ALL.replace_all(&text, "");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
