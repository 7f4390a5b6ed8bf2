//! Normalization of TeX stored in legacy block documents.
//!
//! The old editor stored math two ways: inline formulas as `INLINETEX`
//! entities (`{teX, displaystyle}`), and display formulas as atomic blocks
//! flagged with `{mathjax: true, teX}` in their block data, or pointing at a
//! `TEX` entity. Both are rewritten to one shape the renderer understands:
//! `MATH` entities and `math` blocks carrying `{tex, display}`.

use serde_json::{Value, json};

use super::{BlockDocument, Entity};

pub(crate) const MATH_ENTITY: &str = "MATH";
pub(crate) const MATH_BLOCK: &str = "math";

/// Rewrite all TeX in `doc` into `MATH` entities and `math` blocks.
pub fn preprocess_latex(doc: &BlockDocument) -> BlockDocument {
    let mut doc = doc.clone();

    for entity in doc.entity_map.values_mut() {
        if entity.kind.eq_ignore_ascii_case("INLINETEX") {
            let tex = tex_source(&entity.data).unwrap_or_default();
            let display = entity
                .data
                .get("displaystyle")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            *entity = Entity {
                kind: MATH_ENTITY.to_string(),
                mutability: entity.mutability.clone(),
                data: json!({ "tex": tex, "display": display }),
            };
        }
    }

    for i in 0..doc.blocks.len() {
        if doc.blocks[i].kind != "atomic" {
            continue;
        }
        let from_data = doc.blocks[i]
            .data
            .get("mathjax")
            .and_then(Value::as_bool)
            .unwrap_or(false)
            .then(|| tex_source(&doc.blocks[i].data))
            .flatten();
        let from_entity = doc.blocks[i]
            .entity_ranges
            .first()
            .and_then(|range| doc.entity(&range.key))
            .filter(|entity| entity.kind.eq_ignore_ascii_case("TEX"))
            .and_then(|entity| tex_source(&entity.data));

        if let Some(tex) = from_data.or(from_entity) {
            let block = &mut doc.blocks[i];
            block.kind = MATH_BLOCK.to_string();
            block.text.clear();
            block.inline_style_ranges.clear();
            block.entity_ranges.clear();
            block.data = json!({ "tex": tex, "display": true });
        }
    }

    doc
}

fn tex_source(data: &Value) -> Option<String> {
    ["teX", "tex", "latex"]
        .iter()
        .find_map(|key| data.get(*key).and_then(Value::as_str))
        .map(|s| s.trim().to_string())
}
