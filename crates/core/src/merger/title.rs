use std::collections::HashSet;

use regex_lite::Regex;

use super::extract::file_name;

/// Container extensions stripped before tokenizing.
const CONTAINER_EXTENSIONS: &[&str] = &["mkv", "mp4", "avi", "ts", "m4v", "webm", "mov"];

/// Human-readable episode titles from in-torrent file names.
///
/// The file name loses its container extension and any `NN - ` prefix, is
/// split on `.`, and loses stop words, pure numbers and leading `R<n>`
/// markers. Everything from the first resolution tag on is dropped. An
/// event name like `British Grand Prix` moves to the end after a dash.
#[derive(Debug, Clone)]
pub struct TitleBuilder {
    stop_words: HashSet<String>,
    leading_round: Option<Regex>,
    episode_prefix: Option<Regex>,
    resolution: Option<Regex>,
    event: Option<Regex>,
}

impl TitleBuilder {
    pub fn new<I, S>(stop_words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            stop_words: stop_words
                .into_iter()
                .map(|w| w.as_ref().to_lowercase())
                .collect(),
            leading_round: Regex::new(r"(?i)^R\d+\s*").ok(),
            episode_prefix: Regex::new(r"^\d+\s*-\s*").ok(),
            resolution: Regex::new(r"(?i)(?:^|\s)(?:2160p|1080p|720p|576p|4K|UHD|FHD)(?:\s|$)").ok(),
            event: Regex::new(r"(?i)\b\w+\s+Grand\s+Prix\b").ok(),
        }
    }

    pub fn title(&self, path: &str) -> String {
        let name = strip_container(file_name(path));
        let name = match &self.episode_prefix {
            Some(re) => re.replace(name, "").into_owned(),
            None => name.to_string(),
        };

        let tokens: Vec<String> = name
            .split('.')
            .filter_map(|token| self.keep_token(token))
            .collect();
        let mut title = collapse_spaces(&tokens.join(" "));

        if let Some(m) = self.resolution.as_ref().and_then(|re| re.find(&title)) {
            title = title[..m.start()].trim().to_string();
        }

        if let Some(m) = self.event.as_ref().and_then(|re| re.find(&title)) {
            let event = m.as_str().to_string();
            let rest = collapse_spaces(&format!("{} {}", &title[..m.start()], &title[m.end()..]));
            title = if rest.is_empty() {
                event
            } else {
                format!("{} - {}", rest, event)
            };
        }

        if title.is_empty() {
            strip_container(file_name(path)).replace('.', " ")
        } else {
            title
        }
    }

    fn keep_token(&self, token: &str) -> Option<String> {
        let token = token.trim();
        if token.is_empty()
            || token.chars().all(|c| c.is_ascii_digit())
            || self.stop_words.contains(&token.to_lowercase())
        {
            return None;
        }
        let token = match &self.leading_round {
            Some(re) => re.replace(token, "").into_owned(),
            None => token.to_string(),
        };
        (!token.is_empty()).then_some(token)
    }
}

fn strip_container(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((stem, ext)) if CONTAINER_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()) => {
            stem
        }
        _ => name,
    }
}

fn collapse_spaces(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
