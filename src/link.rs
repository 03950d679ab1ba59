use std::sync::LazyLock;

use regex::Regex;
use reqwest::Url;

static DRIVE_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"https://drive\.google\.com/(drive)?/?u?/?\d?/?(mobile)?/?(file)?(folders)?/?d?/([-\w]+)[?+]?/?(w+)?",
    )
    .expect("drive link pattern is valid")
});

/// Extracts a node id from a share link, or returns the input when it is not a link.
pub fn node_id_from_arg(arg: &str) -> String {
    let arg = arg.trim();
    if let Some(id) = DRIVE_LINK.captures(arg).and_then(|caps| caps.get(5)) {
        return id.as_str().to_string();
    }
    if let Ok(url) = Url::parse(arg) {
        if let Some((_, id)) = url.query_pairs().find(|(key, _)| key == "id") {
            return id.into_owned();
        }
    }
    arg.to_string()
}
