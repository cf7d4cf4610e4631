//! Text handling before the transform call: eligibility filter, cleaning and prompt.

use std::sync::OnceLock;

use regex::Regex;

/// Items with fewer whitespace-separated tokens than this are not relayed.
pub const MIN_TOKENS: usize = 3;

fn markdown_link() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[.*?\]\(.*?\)").expect("static pattern"))
}

fn url() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"https?://\S+").expect("static pattern"))
}

fn mention() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"@\w+").expect("static pattern"))
}

fn newline_run() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n+").expect("static pattern"))
}

/// The dedup key of a raw item text.
pub fn dedup_key(text: &str) -> &str {
    text.trim()
}

/// True when the text is worth relaying: non-blank and at least [`MIN_TOKENS`] tokens.
pub fn is_meaningful(text: &str) -> bool {
    text.split_whitespace().count() >= MIN_TOKENS
}

/// Strips markdown links, URLs and `@mentions`, collapses newline runs and trims.
///
/// Markdown links go first so a URL inside `[label](url)` does not leave a dangling
/// `[label](` behind.
pub fn clean_text(raw: &str) -> String {
    let cleaned = markdown_link().replace_all(raw, "");
    let cleaned = url().replace_all(&cleaned, "");
    let cleaned = mention().replace_all(&cleaned, "");
    let cleaned = newline_run().replace_all(&cleaned, "\n");
    cleaned.trim().to_string()
}

/// Instruction sent to the transformer for one cleaned text.
pub fn build_prompt(cleaned: &str, target_language: &str) -> String {
    format!(
        "Translate the following post into {target_language}.\n\
         Do not include any usernames, mentions, links, or source channel references.\n\
         Write it as a casual, friendly social media caption in one paragraph. No heading, no explanation.\n\
         Do not use slang or shouting. Keep it natural, chill, and neutral.\n\
         \n\
         '{cleaned}'\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_tokens_are_not_meaningful_three_are() {
        assert!(!is_meaningful("ok go"));
        assert!(is_meaningful("ok go now"));
        assert!(!is_meaningful("   \n\t "));
        assert!(!is_meaningful(""));
    }

    #[test]
    fn clean_text_strips_links_mentions_and_urls() {
        let raw = "Big news from @openai today!\n\n\nRead [the post](https://example.com/a) or https://t.me/x now";
        assert_eq!(
            clean_text(raw),
            "Big news from  today!\nRead  or  now"
        );
    }

    #[test]
    fn clean_text_trims_surrounding_whitespace() {
        assert_eq!(clean_text("\n\n  hello world  \n"), "hello world");
    }

    #[test]
    fn prompt_embeds_language_and_quoted_text() {
        let prompt = build_prompt("hello there world", "Malay");
        assert!(prompt.contains("into Malay"));
        assert!(prompt.contains("'hello there world'"));
        assert!(prompt.contains("one paragraph"));
    }
}
