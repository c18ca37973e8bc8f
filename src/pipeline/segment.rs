//! Splits a listing page into per-event line blocks.

use scraper::{ElementRef, Html, Node, Selector};
use tracing::debug;

use crate::pipeline::text::{absolute_link, clean_line, split_clean_lines};
use crate::types::RawBlock;

/// Result of segmenting one listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageOutcome {
    /// At least one heading with a link was found.
    Blocks(Vec<RawBlock>),
    /// No heading with a link; pagination should stop.
    Exhausted,
}

#[derive(Debug, Clone)]
pub struct ListingSegmenter {
    heading_tag: String,
    link_authority: String,
    link_selector: Selector,
}

impl ListingSegmenter {
    pub fn new(heading_tag: &str, link_authority: &str) -> Self {
        Self {
            heading_tag: heading_tag.to_ascii_lowercase(),
            link_authority: link_authority.to_string(),
            link_selector: Selector::parse("a[href]").unwrap(),
        }
    }

    /// Walks the document in order. Each heading holding a link opens a
    /// block that collects text lines until the next heading of the same
    /// tag, wherever it sits in the tree.
    pub fn segment(&self, html: &str) -> PageOutcome {
        let document = Html::parse_document(html);
        let mut blocks = Vec::new();
        let mut current: Option<RawBlock> = None;

        for node in document.tree.root().descendants() {
            match node.value() {
                Node::Element(el) if el.name() == self.heading_tag => {
                    if let Some(block) = current.take() {
                        blocks.push(block);
                    }
                    let Some(heading) = ElementRef::wrap(node) else {
                        continue;
                    };
                    let Some(anchor) = heading.select(&self.link_selector).next() else {
                        // a linkless heading ends the previous block
                        continue;
                    };

                    let title = clean_line(&anchor.text().collect::<String>());
                    let href = anchor.value().attr("href").unwrap_or_default();
                    let detail_url = (!href.trim().is_empty())
                        .then(|| absolute_link(&self.link_authority, href));
                    let lines = heading
                        .text()
                        .flat_map(split_clean_lines)
                        .collect::<Vec<_>>();

                    current = Some(RawBlock {
                        title,
                        lines,
                        detail_url,
                    });
                }
                Node::Text(text) => {
                    let Some(block) = current.as_mut() else {
                        continue;
                    };
                    let excluded = node.ancestors().any(|a| match a.value() {
                        Node::Element(el) => {
                            let name = el.name();
                            name == self.heading_tag || matches!(name, "script" | "style" | "noscript")
                        }
                        _ => false,
                    });
                    // heading text was taken when the heading opened
                    if excluded {
                        continue;
                    }
                    block.lines.extend(split_clean_lines(text));
                }
                _ => {}
            }
        }
        blocks.extend(current);

        if blocks.is_empty() {
            debug!("No linked <{}> headings on page", self.heading_tag);
            return PageOutcome::Exhausted;
        }
        PageOutcome::Blocks(blocks)
    }
}
