//! Spam heuristic for inbound contact submissions.
//!
//! Pure scoring function invoked by the contact write path. Kept free of any
//! storage concern so the thresholds can be unit-tested directly.

/// Keywords that each add 20 points when found in the subject or message.
const SPAM_KEYWORDS: &[&str] = &[
    "viagra",
    "casino",
    "loan",
    "mortgage",
    "bitcoin",
    "crypto",
    "investment",
    "guarantee",
    "urgent",
    "limited time",
    "act now",
];

const KEYWORD_POINTS: u32 = 20;
const URL_POINTS: u32 = 15;
const CAPS_POINTS: u32 = 10;
const SHORT_MESSAGE_POINTS: u32 = 5;
const SHORT_MESSAGE_THRESHOLD: usize = 50;
const SPAM_THRESHOLD: u8 = 50;

/// Result of scoring one submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpamVerdict {
    /// 0..=100
    pub score: u8,
    /// score > 50
    pub is_spam: bool,
}

/// Score a submission's subject and message.
///
/// Additive and order-independent: one hit per keyword, plus penalties for
/// embedded links, shouting, and very short messages. Clamped to 100.
pub fn score(subject: &str, message: &str) -> SpamVerdict {
    let text = format!("{} {}", subject, message).to_lowercase();

    let mut total: u32 = 0;

    for keyword in SPAM_KEYWORDS {
        if text.contains(keyword) {
            total += KEYWORD_POINTS;
        }
    }

    let message_lower = message.to_lowercase();
    if message_lower.contains("http") || message_lower.contains("www.") {
        total += URL_POINTS;
    }

    let char_count = message.chars().count();
    if char_count > 0 {
        let uppercase_count = message.chars().filter(|c| c.is_uppercase()).count();
        if uppercase_count * 2 > char_count {
            total += CAPS_POINTS;
        }
    }

    if char_count < SHORT_MESSAGE_THRESHOLD {
        total += SHORT_MESSAGE_POINTS;
    }

    let score = total.min(100) as u8;
    SpamVerdict {
        score,
        is_spam: score > SPAM_THRESHOLD,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // A message long enough to skip the short-message penalty, with no
    // keywords, links or shouting.
    const CLEAN_MESSAGE: &str =
        "i would like to talk about building a small website for my bakery next month.";

    #[test]
    fn test_clean_message_scores_zero() {
        let verdict = score("website for my bakery", CLEAN_MESSAGE);
        assert_eq!(verdict.score, 0);
        assert!(!verdict.is_spam);
    }

    #[test]
    fn test_score_always_in_range() {
        let inputs = [
            ("", ""),
            ("URGENT", "ACT NOW! LIMITED TIME! www.example.com"),
            ("hello", CLEAN_MESSAGE),
            ("viagra casino loan mortgage", "bitcoin crypto investment guarantee urgent act now limited time http://x"),
        ];
        for (subject, message) in inputs {
            let verdict = score(subject, message);
            assert!(verdict.score <= 100);
            assert_eq!(verdict.is_spam, verdict.score > 50);
        }
    }

    #[test]
    fn test_two_keywords_score_forty_not_spam() {
        // "guarantee" and "act now", no other triggers
        let message =
            "we can guarantee results for your project, please act now so we can get started soon.";
        let verdict = score("an offer", message);
        assert_eq!(verdict.score, 40);
        assert!(!verdict.is_spam);
    }

    #[test]
    fn test_keyword_counted_once() {
        let message = "urgent urgent urgent, this is very urgent but nothing else is wrong here ok.";
        let verdict = score("urgent", message);
        assert_eq!(verdict.score, 20);
    }

    #[test]
    fn test_short_caps_url_message() {
        // url (15) + caps (10) + short (5), no keywords
        let verdict = score("hi", "LOOK AT THIS LINK http://a");
        assert_eq!(verdict.score, 30);
        assert!(!verdict.is_spam);
    }

    #[test]
    fn test_www_counts_as_link() {
        let message = "please take a look at www.example.com when you get a chance, thanks a lot.";
        let verdict = score("a link", message);
        assert_eq!(verdict.score, 15);
    }

    #[test]
    fn test_many_keywords_clamp_at_hundred() {
        let message = "viagra casino loan mortgage bitcoin crypto investment guarantee urgent limited time act now";
        let verdict = score("viagra casino loan", message);
        assert_eq!(verdict.score, 100);
        assert!(verdict.is_spam);
    }

    #[test]
    fn test_threshold_is_exclusive() {
        // exactly 50 points: keyword (20) + url (15) + caps (10) + short (5)
        let verdict = score("x", "URGENT SEE THIS http://a");
        assert_eq!(verdict.score, 50);
        assert!(!verdict.is_spam);
    }

    #[test]
    fn test_keywords_matched_in_subject_too() {
        let verdict = score(
            "limited time offer",
            "this message is long enough to avoid the short penalty and has no links at all.",
        );
        assert_eq!(verdict.score, 20);
    }

    #[test]
    fn test_case_insensitive_keyword_match() {
        let verdict = score(
            "BITCOIN opportunity",
            "a perfectly long message body that otherwise has nothing suspicious inside it.",
        );
        assert_eq!(verdict.score, 20);
    }
}
