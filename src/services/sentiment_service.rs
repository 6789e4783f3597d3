use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::config::{SentimentConfig, SentimentMethod, SUPPORTED_LANGUAGES};
use crate::models::{ScoreQuality, SentimentScore};

const TITLE_WEIGHT: f64 = 0.6;
const CONTENT_WEIGHT: f64 = 0.4;

/// Confidence ceiling for short or mixed-language text.
pub const DEGRADED_CONFIDENCE_CAP: f64 = 0.5;
pub const UNSUPPORTED_LANGUAGE_CONFIDENCE: f64 = 0.1;

/// A script must cover this share of letters for the text to count as
/// single-language.
const DOMINANT_SCRIPT_SHARE: f64 = 0.8;

/// Negated sentiment words flip and dampen (VADER's N_SCALAR).
const NEGATION_SCALAR: f64 = -0.74;
/// Tokens inspected before a sentiment word for negators and intensifiers.
const MODIFIER_WINDOW: usize = 3;
const CAPS_EMPHASIS: f64 = 1.25;
const EXCLAMATION_STEP: f64 = 0.1;
const MAX_EXCLAMATIONS: usize = 4;

const EN_SENTIMENT: &[(&str, f64)] = &[
    ("growth", 0.5),
    ("gain", 0.5),
    ("gains", 0.5),
    ("rise", 0.4),
    ("rises", 0.4),
    ("rally", 0.6),
    ("surge", 0.6),
    ("strong", 0.5),
    ("robust", 0.5),
    ("recovery", 0.6),
    ("expand", 0.4),
    ("expansion", 0.4),
    ("optimistic", 0.6),
    ("boost", 0.5),
    ("improve", 0.4),
    ("improved", 0.4),
    ("beat", 0.4),
    ("upgrade", 0.5),
    ("stable", 0.3),
    ("stimulus", 0.3),
    ("easing", 0.3),
    ("record", 0.3),
    ("recession", -0.7),
    ("inflation", -0.3),
    ("crisis", -0.8),
    ("decline", -0.5),
    ("declines", -0.5),
    ("fall", -0.4),
    ("falls", -0.4),
    ("drop", -0.4),
    ("slump", -0.6),
    ("weak", -0.5),
    ("tightening", -0.3),
    ("hike", -0.3),
    ("tariff", -0.4),
    ("tariffs", -0.4),
    ("default", -0.7),
    ("layoffs", -0.5),
    ("unemployment", -0.4),
    ("deficit", -0.3),
    ("slowdown", -0.5),
    ("downgrade", -0.5),
    ("sanctions", -0.5),
    ("war", -0.6),
    ("uncertainty", -0.4),
    ("volatility", -0.3),
    ("bankruptcy", -0.8),
    ("contraction", -0.5),
    ("fears", -0.5),
];

const EN_NEGATORS: &[&str] = &["not", "no", "never", "without", "hardly", "neither", "nor"];

const EN_INTENSIFIERS: &[(&str, f64)] = &[
    ("very", 1.3),
    ("sharply", 1.4),
    ("significantly", 1.3),
    ("extremely", 1.5),
    ("slightly", 0.7),
    ("modestly", 0.8),
];

const ZH_SENTIMENT: &[(&str, f64)] = &[
    ("增长", 0.5),
    ("上涨", 0.5),
    ("上升", 0.4),
    ("复苏", 0.6),
    ("利好", 0.7),
    ("稳定", 0.3),
    ("回暖", 0.5),
    ("扩张", 0.4),
    ("提振", 0.5),
    ("宽松", 0.3),
    ("降息", 0.3),
    ("突破", 0.4),
    ("乐观", 0.6),
    ("改善", 0.4),
    ("强劲", 0.5),
    ("下跌", -0.5),
    ("衰退", -0.7),
    ("危机", -0.8),
    ("通胀", -0.3),
    ("加息", -0.3),
    ("收紧", -0.3),
    ("放缓", -0.5),
    ("利空", -0.7),
    ("违约", -0.7),
    ("失业", -0.4),
    ("制裁", -0.5),
    ("关税", -0.4),
    ("暴跌", -0.8),
    ("萎缩", -0.5),
    ("担忧", -0.4),
    ("风险", -0.3),
    ("紧缩", -0.4),
    ("下滑", -0.5),
    ("疲软", -0.5),
    ("不确定", -0.4),
    ("贸易战", -0.6),
];

const ZH_NEGATORS: &[&str] = &["不", "未", "没有", "没", "无", "非", "并非"];

const ZH_INTENSIFIERS: &[(&str, f64)] = &[
    ("大幅", 1.4),
    ("显著", 1.3),
    ("急剧", 1.5),
    ("非常", 1.3),
    ("小幅", 0.7),
    ("略", 0.7),
    ("温和", 0.8),
];

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Sentiment { score: f64, emphasized: bool },
    Negator,
    Intensifier(f64),
    Other,
}

/// Running totals over sentiment-bearing tokens. Merges across languages.
#[derive(Debug, Clone, Copy, Default)]
struct LexiconReading {
    score_sum: f64,
    abs_sum: f64,
    hits: usize,
}

impl LexiconReading {
    fn merge(self, other: LexiconReading) -> LexiconReading {
        LexiconReading {
            score_sum: self.score_sum + other.score_sum,
            abs_sum: self.abs_sum + other.abs_sum,
            hits: self.hits + other.hits,
        }
    }

    fn polarity(&self) -> f64 {
        if self.hits == 0 {
            return 0.0;
        }
        (self.score_sum / self.hits as f64).clamp(-1.0, 1.0)
    }

    fn subjectivity(&self) -> f64 {
        if self.hits == 0 {
            return 0.0;
        }
        (0.3 + 0.7 * self.abs_sum / self.hits as f64).min(1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Script {
    Latin,
    Chinese,
    Mixed,
}

struct Lexicon {
    words: HashMap<&'static str, Token>,
    /// Longest entry in characters, bounds the maximal-match scan.
    max_chars: usize,
}

impl Lexicon {
    fn build(sentiment: &[(&'static str, f64)], negators: &[&'static str], intensifiers: &[(&'static str, f64)]) -> Self {
        let mut words = HashMap::new();
        for (word, score) in sentiment {
            words.insert(*word, Token::Sentiment { score: *score, emphasized: false });
        }
        for word in negators {
            words.insert(*word, Token::Negator);
        }
        for (word, mult) in intensifiers {
            words.insert(*word, Token::Intensifier(*mult));
        }
        let max_chars = words.keys().map(|w| w.chars().count()).max().unwrap_or(1);
        Self { words, max_chars }
    }

    fn lookup(&self, word: &str) -> Option<Token> {
        self.words.get(word).copied()
    }
}

/// Bilingual financial-news sentiment scorer.
///
/// Scoring is a pure function of the input text, its language tag and the
/// scorer's configuration.
pub struct SentimentScorer {
    method: SentimentMethod,
    default_language: String,
    min_text_length: usize,
    english: Lexicon,
    chinese: Lexicon,
}

impl SentimentScorer {
    pub fn new(method: SentimentMethod, default_language: &str, min_text_length: usize) -> Self {
        Self {
            method,
            default_language: default_language.to_string(),
            min_text_length: min_text_length.max(1),
            english: Lexicon::build(EN_SENTIMENT, EN_NEGATORS, EN_INTENSIFIERS),
            chinese: Lexicon::build(ZH_SENTIMENT, ZH_NEGATORS, ZH_INTENSIFIERS),
        }
    }

    pub fn from_config(config: &SentimentConfig) -> Self {
        Self::new(config.method, &config.language, config.min_text_length)
    }

    pub fn score_text(&self, text: &str, language: Option<&str>) -> SentimentScore {
        self.score_parts(&[(text, 1.0)], language)
    }

    /// Article polarity and subjectivity weigh the title 0.6 and the content
    /// 0.4. Confidence is judged on the whole article.
    pub fn score_article(&self, title: &str, content: &str, language: Option<&str>) -> SentimentScore {
        self.score_parts(&[(title, TITLE_WEIGHT), (content, CONTENT_WEIGHT)], language)
    }

    fn score_parts(&self, parts: &[(&str, f64)], language: Option<&str>) -> SentimentScore {
        let tag = language.unwrap_or(&self.default_language);
        let primary = primary_language(tag);
        if !SUPPORTED_LANGUAGES.contains(&primary.as_str()) {
            debug!("Unsupported language tag '{}', scoring neutral", tag);
            return SentimentScore::neutral(UNSUPPORTED_LANGUAGE_CONFIDENCE, ScoreQuality::UnsupportedLanguage);
        }

        let cleaned: Vec<(String, f64)> = parts
            .iter()
            .map(|(text, weight)| (preprocess(text), *weight))
            .filter(|(text, _)| !text.is_empty())
            .collect();
        if cleaned.is_empty() {
            return SentimentScore::neutral(0.0, ScoreQuality::EmptyText);
        }

        let whole = cleaned.iter().map(|(t, _)| t.as_str()).collect::<Vec<_>>().join(" ");
        let script = detect_script(&whole, &primary);

        let total_weight: f64 = cleaned.iter().map(|(_, w)| w).sum();
        let mut polarity = 0.0;
        let mut subjectivity = 0.0;
        for (text, weight) in &cleaned {
            let reading = self.read(text, script);
            polarity += weight / total_weight * reading.polarity();
            subjectivity += weight / total_weight * reading.subjectivity();
        }

        if self.method == SentimentMethod::Vader {
            let exclamations = whole.chars().filter(|c| *c == '!' || *c == '！').count();
            polarity *= 1.0 + EXCLAMATION_STEP * exclamations.min(MAX_EXCLAMATIONS) as f64;
        }
        let polarity = polarity.clamp(-1.0, 1.0);
        let subjectivity = subjectivity.clamp(0.0, 1.0);

        let (confidence, quality) = self.judge_confidence(polarity, subjectivity, whole.chars().count(), script);
        SentimentScore {
            polarity,
            subjectivity,
            confidence,
            quality,
        }
    }

    fn judge_confidence(&self, polarity: f64, subjectivity: f64, length: usize, script: Script) -> (f64, ScoreQuality) {
        let mut confidence = (polarity.abs() + subjectivity) / 2.0;
        let mut quality = ScoreQuality::Normal;

        if length < self.min_text_length {
            let length_factor = 0.5 + 0.5 * length as f64 / self.min_text_length as f64;
            confidence = (confidence * length_factor).min(DEGRADED_CONFIDENCE_CAP);
            quality = ScoreQuality::ShortText;
        }
        if script == Script::Mixed {
            confidence = confidence.min(DEGRADED_CONFIDENCE_CAP);
            quality = quality.max(ScoreQuality::MixedLanguage);
        }

        (confidence.clamp(0.0, 1.0), quality)
    }

    fn read(&self, text: &str, script: Script) -> LexiconReading {
        match script {
            Script::Latin => score_tokens(&self.english_tokens(text)),
            Script::Chinese => score_tokens(&self.chinese_tokens(text)),
            Script::Mixed => {
                score_tokens(&self.english_tokens(text)).merge(score_tokens(&self.chinese_tokens(text)))
            }
        }
    }

    fn english_tokens(&self, text: &str) -> Vec<Token> {
        let vader = self.method == SentimentMethod::Vader;
        text.split(|c: char| !(c.is_ascii_alphanumeric() || c == '\''))
            .filter(|w| !w.is_empty())
            .map(|word| {
                let lower = word.to_lowercase();
                if lower.ends_with("n't") {
                    return Token::Negator;
                }
                match self.english.lookup(&lower) {
                    Some(Token::Sentiment { score, .. }) => Token::Sentiment {
                        score,
                        emphasized: vader && word.len() > 1 && word.chars().all(|c| c.is_ascii_uppercase()),
                    },
                    Some(token) => token,
                    None => Token::Other,
                }
            })
            .collect()
    }

    /// Forward maximal matching against the Chinese lexicon; unmatched
    /// characters become `Other`.
    fn chinese_tokens(&self, text: &str) -> Vec<Token> {
        let chars: Vec<char> = text.chars().filter(|c| !c.is_whitespace()).collect();
        let mut tokens = Vec::with_capacity(chars.len());
        let mut i = 0;
        let mut candidate = String::new();

        while i < chars.len() {
            let mut matched = None;
            for len in (1..=self.chinese.max_chars.min(chars.len() - i)).rev() {
                candidate.clear();
                candidate.extend(&chars[i..i + len]);
                if let Some(token) = self.chinese.lookup(&candidate) {
                    matched = Some((token, len));
                    break;
                }
            }
            match matched {
                Some((token, len)) => {
                    tokens.push(token);
                    i += len;
                }
                None => {
                    tokens.push(Token::Other);
                    i += 1;
                }
            }
        }
        tokens
    }
}

fn score_tokens(tokens: &[Token]) -> LexiconReading {
    let mut reading = LexiconReading::default();

    for (idx, token) in tokens.iter().enumerate() {
        let Token::Sentiment { score, emphasized } = *token else {
            continue;
        };
        let window = &tokens[idx.saturating_sub(MODIFIER_WINDOW)..idx];
        let mut adjusted = score;
        for modifier in window {
            match modifier {
                Token::Intensifier(mult) => adjusted *= mult,
                Token::Negator => adjusted *= NEGATION_SCALAR,
                _ => {}
            }
        }
        if emphasized {
            adjusted *= CAPS_EMPHASIS;
        }
        let adjusted = adjusted.clamp(-1.0, 1.0);

        reading.score_sum += adjusted;
        reading.abs_sum += adjusted.abs();
        reading.hits += 1;
    }
    reading
}

/// `zh-CN` / `zh_TW` / `EN` -> `zh` / `zh` / `en`.
fn primary_language(tag: &str) -> String {
    tag.split(['-', '_'])
        .next()
        .unwrap_or_default()
        .trim()
        .to_lowercase()
}

fn is_cjk(c: char) -> bool {
    matches!(c as u32, 0x4E00..=0x9FFF | 0x3400..=0x4DBF | 0xF900..=0xFAFF)
}

/// Decide the script by letter share. Text without letters falls back to the
/// language tag.
fn detect_script(text: &str, primary_language: &str) -> Script {
    let cjk = text.chars().filter(|c| is_cjk(*c)).count();
    let latin = text.chars().filter(|c| c.is_ascii_alphabetic()).count();
    let letters = cjk + latin;
    if letters == 0 {
        return if primary_language == "zh" { Script::Chinese } else { Script::Latin };
    }
    let cjk_share = cjk as f64 / letters as f64;
    if cjk_share >= DOMINANT_SCRIPT_SHARE {
        Script::Chinese
    } else if 1.0 - cjk_share >= DOMINANT_SCRIPT_SHARE {
        Script::Latin
    } else {
        Script::Mixed
    }
}

/// Opening, closing and comment tags. A bare `<` as in "利率 < 3%" is text.
const HTML_TAG_PATTERN: &str = r"<(?:/?[A-Za-z][A-Za-z0-9-]*(?:\s[^<>]*)?/?|!--.*?--)>";
/// URLs end at whitespace or the first character outside the URL alphabet,
/// so Chinese text glued to a link survives.
const URL_PATTERN: &str = r"(?i)(?:https?://|www\.)[A-Za-z0-9\-._~:/?#\[\]@!$&'()*+,;=%]+";

static HTML_TAG: OnceLock<Option<Regex>> = OnceLock::new();
static URL: OnceLock<Option<Regex>> = OnceLock::new();

fn compiled(cell: &'static OnceLock<Option<Regex>>, pattern: &str) -> Option<&'static Regex> {
    cell.get_or_init(|| Regex::new(pattern).ok()).as_ref()
}

/// Strip HTML tags and URLs, collapse whitespace.
pub fn preprocess(text: &str) -> String {
    let mut cleaned = text.to_string();
    for re in [compiled(&HTML_TAG, HTML_TAG_PATTERN), compiled(&URL, URL_PATTERN)].into_iter().flatten() {
        cleaned = re.replace_all(&cleaned, " ").into_owned();
    }
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scorer() -> SentimentScorer {
        SentimentScorer::new(SentimentMethod::Lexicon, "zh", 40)
    }

    const PADDING: &str = "今天的会议记录已经发布并归档。";

    #[test]
    fn test_negative_chinese_headline() {
        let score = scorer().score_text("央行宣布加息以应对通胀", Some("zh"));
        assert!(score.polarity < 0.0);
        assert!(score.subjectivity > 0.0);
        assert_eq!(score.quality, ScoreQuality::ShortText);
        assert!(score.confidence <= DEGRADED_CONFIDENCE_CAP);
    }

    #[test]
    fn test_english_negation_flips_sign() {
        let s = SentimentScorer::new(SentimentMethod::Lexicon, "en", 10);
        let plain = s.score_text("the economy shows a strong recovery", Some("en"));
        let negated = s.score_text("the economy shows no strong recovery", Some("en"));
        assert!(plain.polarity > 0.0);
        assert!(negated.polarity < 0.0);
    }

    #[test]
    fn test_chinese_negation_and_intensifier() {
        let s = scorer();
        let plain = s.score_text("股市下跌", Some("zh"));
        let negated = s.score_text("股市没有下跌", Some("zh"));
        let intensified = s.score_text("股市大幅下跌", Some("zh"));
        assert!(plain.polarity < 0.0);
        assert!(negated.polarity > 0.0);
        assert!(intensified.polarity < plain.polarity);
    }

    #[test]
    fn test_short_text_confidence_never_exceeds_long_text() {
        let s = scorer();
        let short = s.score_text("经济衰退", Some("zh"));
        let long = s.score_text(&format!("经济衰退。{}", PADDING.repeat(3)), Some("zh"));

        assert_eq!(short.polarity, long.polarity);
        assert_eq!(short.quality, ScoreQuality::ShortText);
        assert_eq!(long.quality, ScoreQuality::Normal);
        assert!(short.confidence <= long.confidence);
        assert!(short.confidence <= DEGRADED_CONFIDENCE_CAP);
    }

    #[test]
    fn test_confidence_grows_with_length_below_threshold() {
        let s = scorer();
        let mut previous = 0.0;
        for repeats in 0..3 {
            let text = format!("经济衰退。{}", "报告".repeat(repeats * 5));
            let score = s.score_text(&text, Some("zh"));
            assert!(score.confidence >= previous);
            previous = score.confidence;
        }
    }

    #[test]
    fn test_unsupported_language_is_neutral() {
        let score = scorer().score_text("La economía entra en recesión", Some("es"));
        assert_eq!(score.polarity, 0.0);
        assert_eq!(score.subjectivity, 0.0);
        assert_eq!(score.confidence, UNSUPPORTED_LANGUAGE_CONFIDENCE);
        assert_eq!(score.quality, ScoreQuality::UnsupportedLanguage);
    }

    #[test]
    fn test_mixed_language_caps_confidence() {
        let s = SentimentScorer::new(SentimentMethod::Lexicon, "zh", 5);
        let score = s.score_text("市场 crisis 危机 recession fears 暴跌 衰退 加剧", Some("zh-CN"));
        assert_eq!(score.quality, ScoreQuality::MixedLanguage);
        assert!(score.confidence <= DEGRADED_CONFIDENCE_CAP);
        assert!(score.polarity < 0.0);
    }

    #[test]
    fn test_empty_after_cleanup() {
        let score = scorer().score_text("<p> https://example.com/a </p>", None);
        assert_eq!(score.quality, ScoreQuality::EmptyText);
        assert_eq!(score.confidence, 0.0);
    }

    #[test]
    fn test_article_weights_title_over_content() {
        let s = SentimentScorer::new(SentimentMethod::Lexicon, "en", 1);
        let score = s.score_article("Recession fears", "Analysts expect a strong recovery", Some("en"));
        let title = s.score_text("Recession fears", Some("en"));
        let content = s.score_text("Analysts expect a strong recovery", Some("en"));
        let expected = 0.6 * title.polarity + 0.4 * content.polarity;
        assert!((score.polarity - expected).abs() < 1e-12);
    }

    #[test]
    fn test_vader_emphasis_amplifies() {
        let lexicon = SentimentScorer::new(SentimentMethod::Lexicon, "en", 1);
        let vader = SentimentScorer::new(SentimentMethod::Vader, "en", 1);
        let text = "Markets in CRISIS!!";
        assert!(vader.score_text(text, Some("en")).polarity < lexicon.score_text(text, Some("en")).polarity);
    }

    #[test]
    fn test_preprocess_strips_markup() {
        assert_eq!(
            preprocess("<b>Fed</b>  raises\n rates http://x.y/z now"),
            "Fed raises rates now"
        );
        assert_eq!(
            preprocess(r#"<p class="lead">央行<!-- ad -->加息</p><br/>"#),
            "央行 加息"
        );
    }

    #[test]
    fn test_preprocess_keeps_text_after_stray_angle_bracket() {
        assert_eq!(
            preprocess("Inflation < 2% while growth > 3% beats forecasts"),
            "Inflation < 2% while growth > 3% beats forecasts"
        );
        assert_eq!(preprocess("利率<3%，经济增长强劲"), "利率<3%，经济增长强劲");
        assert_eq!(preprocess("a <= b and rates fall"), "a <= b and rates fall");
    }

    #[test]
    fn test_preprocess_removes_urls_glued_to_chinese() {
        assert_eq!(preprocess("详见https://pbc.gov.cn/a?b=1。央行加息"), "详见 。央行加息");
        assert_eq!(preprocess("see WWW.example.com/news for more"), "see for more");
    }

    #[test]
    fn test_stray_angle_bracket_keeps_sentiment() {
        let en = SentimentScorer::new(SentimentMethod::Lexicon, "en", 1);
        let with_bracket = en.score_text("Unemployment < 4% as growth surges and markets gain", Some("en"));
        assert!(with_bracket.polarity > 0.0);

        let zh = scorer().score_text("失业率<4%，经济增长强劲，市场上涨", Some("zh"));
        assert!(zh.polarity > 0.0);
    }
}
