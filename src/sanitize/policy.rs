//! Allow-lists for user-submitted markup.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

pub const ALLOWED_TAGS: &[&str] = &[
    "h1", "h2", "h3", "h4", "h5", "h6", "blockquote", "p", "ul", "ol", "nl", "li", "b", "i", "u",
    "strong", "em", "strike", "s", "code", "hr", "br", "div", "table", "thead", "caption",
    "tbody", "tfoot", "tr", "th", "td", "col", "colgroup", "pre", "img", "figure", "figcaption",
    "section", "span", "sub", "sup", "ins", "del", "iframe", "a", "details", "summary", "svg",
    "path",
    // MathML
    "math", "semantics", "annotation", "mi", "mn", "mo", "ms", "mspace", "mtext", "merror",
    "mfrac", "mpadded", "mphantom", "mroot", "mrow", "msqrt", "mstyle", "mmultiscripts", "mover",
    "mprescripts", "msub", "msubsup", "msup", "munder", "munderover", "mtable", "mtd", "mtr",
];

/// Tags whose content is dropped together with the tag.
pub const NON_TEXT_TAGS: &[&str] = &[
    "script", "style", "textarea", "option", "noscript", "title", "head", "template",
];

/// Allowed on every allowed tag.
pub const GLOBAL_ATTRIBUTES: &[&str] = &["data-internal-id"];

const MATHML_ATTRIBUTES: &[&str] = &[
    "display", "xmlns", "mathvariant", "stretchy", "fence", "separator", "accent", "accentunder",
    "lspace", "rspace", "movablelimits", "displaystyle", "scriptlevel", "columnalign",
    "rowspacing", "columnspacing", "linethickness", "width", "height", "depth", "voffset",
    "encoding", "symmetric", "largeop", "minsize", "maxsize", "form",
];

const FOOTNOTE_ATTRIBUTES: &[&str] = &[
    "data-footnote-id",
    "data-footnote-index",
    "data-footnote-reference",
    "data-footnote-item",
    "data-footnote-content",
    "data-footnote-back-link",
    "data-footnote-section",
];

pub static ALLOWED_ATTRIBUTES: LazyLock<HashMap<&'static str, Vec<&'static str>>> =
    LazyLock::new(|| {
        let mut map: HashMap<&'static str, Vec<&'static str>> = HashMap::new();
        let mut allow = |tag: &'static str, attrs: &[&'static str]| {
            map.entry(tag).or_default().extend_from_slice(attrs);
        };

        allow("img", &["src", "srcset", "alt", "style"]);
        allow("figure", &["style", "class"]);
        allow("table", &["style"]);
        allow("td", &["rowspan", "colspan", "style"]);
        allow("th", &["rowspan", "colspan", "style"]);
        allow("col", &["span", "style"]);
        allow("ol", &["start", "reversed", "style", "class", "role"]);
        allow("ol", FOOTNOTE_ATTRIBUTES);
        allow("ul", &["class", "style"]);
        allow("li", &["class", "id", "role"]);
        allow("li", FOOTNOTE_ATTRIBUTES);
        allow("span", &["style", "id", "role", "class"]);
        allow("span", FOOTNOTE_ATTRIBUTES);
        allow("div", &["class", "data-oembed-url", "data-elicit-id", "data-metaculus-id"]);
        allow("div", FOOTNOTE_ATTRIBUTES);
        allow("p", &["class"]);
        allow("section", &["class", "role", "user-id", "user-order", "display-name", "submitted-date"]);
        allow("section", FOOTNOTE_ATTRIBUTES);
        allow("a", &["class", "href", "name", "target", "rel", "data-href", "id", "role"]);
        allow("a", FOOTNOTE_ATTRIBUTES);
        allow("iframe", &["src", "allowfullscreen", "allow", "class", "style", "width", "height", "frameborder"]);
        allow("svg", &["width", "height", "viewbox", "viewBox", "fill", "xmlns"]);
        allow("path", &["d", "fill", "stroke", "stroke-width"]);
        allow("details", &["open"]);
        for h in ["h1", "h2", "h3", "h4", "h5", "h6"] {
            allow(h, &["id"]);
        }
        for tag in ALLOWED_TAGS.iter().copied().filter(|t| is_mathml(t)) {
            allow(tag, MATHML_ATTRIBUTES);
        }
        map
    });

/// Tags listed here keep only these classes. Tags that allow `class` but
/// are not listed keep every class.
pub static ALLOWED_CLASSES: LazyLock<HashMap<&'static str, &'static [&'static str]>> =
    LazyLock::new(|| {
        HashMap::from([
            (
                "div",
                &[
                    "spoilers",
                    "spoiler-v2",
                    "footnote-content",
                    "footnotes",
                    "footnote-section",
                    "metaculus-preview",
                    "elicit-binary-prediction",
                    "thoughtSaverFrameWrapper",
                    "detailsBlock",
                    "detailsBlockTitle",
                    "detailsBlockContent",
                    "dialogue-message-content",
                    "dialogue-message-input-wrapper",
                ][..],
            ),
            ("p", &["spoiler-v2"][..]),
            (
                "span",
                &[
                    "footnote-reference",
                    "footnote-label",
                    "footnote-back-link",
                    "math-tex",
                ][..],
            ),
            ("ol", &["footnotes", "footnote-section"][..]),
            ("ul", &["contains-task-list"][..]),
            ("li", &["footnote-item", "task-list-item"][..]),
            (
                "section",
                &[
                    "footnotes",
                    "footnote-section",
                    "dialogue-message",
                    "dialogue-message-header",
                ][..],
            ),
            ("iframe", &["thoughtSaverFrame"][..]),
            (
                "figure",
                &["table", "image", "image_resized", "image-style-side", "media"][..],
            ),
        ])
    });

static CSS_SIZE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:\d|\.)+(?:px|em|%)$").expect("static regex"));

static CSS_COLOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^(?:#(?:[0-9a-fA-F]{3}){1,2}",
        r"|rgba?\(\s*\d{1,3}(?:\.\d+)?%?\s*,\s*\d{1,3}(?:\.\d+)?%?\s*,\s*\d{1,3}(?:\.\d+)?%?\s*(?:,\s*(?:0|1|0?\.\d+|\d{1,3}%)\s*)?\)",
        r"|hsla?\(\s*\d{1,3}(?:\.\d+)?\s*,\s*\d{1,3}(?:\.\d+)?%\s*,\s*\d{1,3}(?:\.\d+)?%\s*(?:,\s*(?:0|1|0?\.\d+|\d{1,3}%)\s*)?\))$"
    ))
    .expect("static regex")
});

static ANY_VALUE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[^<>]*$").expect("static regex"));

static ALIGNMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:left|right|center|justify|top|middle|bottom|baseline)$").expect("static regex")
});

/// Constraint on a single style property's value.
#[derive(Clone, Copy)]
pub enum StyleRule {
    Size,
    Color,
    Alignment,
    Any,
}

impl StyleRule {
    pub fn accepts(self, value: &str) -> bool {
        let value = value.trim();
        match self {
            StyleRule::Size => CSS_SIZE.is_match(value),
            StyleRule::Color => CSS_COLOR.is_match(value),
            StyleRule::Alignment => ALIGNMENT.is_match(value),
            StyleRule::Any => ANY_VALUE.is_match(value),
        }
    }
}

const TABLE_STYLES: &[(&str, StyleRule)] = &[
    ("background-color", StyleRule::Color),
    ("border", StyleRule::Any),
    ("border-bottom", StyleRule::Any),
    ("border-top", StyleRule::Any),
    ("border-left", StyleRule::Any),
    ("border-right", StyleRule::Any),
    ("border-color", StyleRule::Color),
    ("border-style", StyleRule::Any),
    ("border-width", StyleRule::Size),
    ("padding", StyleRule::Any),
    ("text-align", StyleRule::Alignment),
    ("vertical-align", StyleRule::Alignment),
    ("width", StyleRule::Size),
    ("height", StyleRule::Size),
];

pub static ALLOWED_STYLES: LazyLock<HashMap<&'static str, &'static [(&'static str, StyleRule)]>> =
    LazyLock::new(|| {
        HashMap::from([
            ("table", TABLE_STYLES),
            ("td", TABLE_STYLES),
            ("th", TABLE_STYLES),
            ("col", &[("width", StyleRule::Size)][..]),
            (
                "img",
                &[
                    ("width", StyleRule::Size),
                    ("height", StyleRule::Size),
                    ("max-width", StyleRule::Size),
                    ("max-height", StyleRule::Size),
                ][..],
            ),
            (
                "figure",
                &[
                    ("width", StyleRule::Size),
                    ("height", StyleRule::Size),
                    ("max-width", StyleRule::Size),
                    ("padding", StyleRule::Any),
                ][..],
            ),
            (
                "span",
                &[
                    ("color", StyleRule::Color),
                    ("background-color", StyleRule::Color),
                ][..],
            ),
            ("ol", &[("list-style-type", StyleRule::Any)][..]),
            ("ul", &[("list-style-type", StyleRule::Any)][..]),
            (
                "iframe",
                &[("width", StyleRule::Size), ("height", StyleRule::Size)][..],
            ),
        ])
    });

pub const ALLOWED_IFRAME_HOSTS: &[&str] = &[
    "www.youtube.com",
    "youtube.com",
    "www.youtube-nocookie.com",
    "player.vimeo.com",
    "strawpoll.com",
    "www.strawpoll.com",
    "ourworldindata.org",
    "www.ourworldindata.org",
    "metaculus.com",
    "www.metaculus.com",
    "elicit.org",
    "manifold.markets",
    "neuronpedia.org",
    "www.neuronpedia.org",
    "app.thoughtsaver.com",
    "docs.google.com",
    "calendly.com",
    "viewer.estimaker.app",
    "d3s0w6fek99l5b.cloudfront.net",
];

pub const ALLOWED_SCHEMES: &[&str] = &["http", "https", "ftp", "mailto"];

/// Attributes whose values are URLs and must pass the scheme check.
pub const URL_ATTRIBUTES: &[&str] = &["href", "src", "data-href"];

pub fn is_mathml(tag: &str) -> bool {
    matches!(tag, "math" | "semantics" | "annotation") || (tag.starts_with('m') && tag.len() > 1 && tag != "main")
}
