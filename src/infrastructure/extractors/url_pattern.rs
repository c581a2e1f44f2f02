//! Glob-style URL support patterns.

use regex::Regex;

/// Set of glob patterns matched against scheme-less URLs.
///
/// `*` matches any run of characters (including `/`) and `?` matches one.
/// The URL's `http://` or `https://` scheme and a leading `www.` are removed
/// before matching.
#[derive(Debug, Clone)]
pub struct UrlPatterns {
    globs: Vec<&'static str>,
    compiled: Vec<Regex>,
}

impl UrlPatterns {
    /// Compiles the glob patterns.
    ///
    /// # Errors
    /// Returns error if a translated pattern fails to compile.
    pub fn new(globs: &[&'static str]) -> Result<Self, regex::Error> {
        let compiled = globs
            .iter()
            .map(|glob| Regex::new(&glob_to_regex(glob)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            globs: globs.to_vec(),
            compiled,
        })
    }

    /// Returns whether any pattern matches the URL.
    #[must_use]
    pub fn matches(&self, url: &str) -> bool {
        let bare = strip_scheme_and_www(url);
        self.compiled.iter().any(|re| re.is_match(bare))
    }

    /// Returns the source glob patterns.
    #[must_use]
    pub fn globs(&self) -> &[&'static str] {
        &self.globs
    }
}

fn strip_scheme_and_www(url: &str) -> &str {
    let bare = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);
    bare.strip_prefix("www.").unwrap_or(bare)
}

fn glob_to_regex(glob: &str) -> String {
    let mut pattern = String::with_capacity(glob.len() + 8);
    pattern.push('^');
    for ch in glob.chars() {
        match ch {
            '*' => pattern.push_str(".*"),
            '?' => pattern.push('.'),
            other => pattern.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
        }
    }
    pattern.push('$');
    pattern
}
