//! Built-in TeX → MathML engine.

use async_trait::async_trait;
use pulldown_latex::config::DisplayMode;
use pulldown_latex::{Parser, RenderConfig, Storage, push_mathml};

use super::{Formula, FormulaError, MathEngine};

/// Renders TeX to MathML with `pulldown-latex`.
///
/// Typesetting is CPU-bound, so each batch runs on tokio's blocking pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct LatexEngine;

#[async_trait]
impl MathEngine for LatexEngine {
    async fn typeset(&self, formulas: Vec<Formula>) -> Vec<Result<String, FormulaError>> {
        let fallback: Vec<(usize, String)> = formulas
            .iter()
            .map(|f| (f.id, f.source.clone()))
            .collect();

        let handle = tokio::task::spawn_blocking(move || {
            formulas.iter().map(typeset_formula).collect::<Vec<_>>()
        });

        match handle.await {
            Ok(results) => results,
            Err(e) => {
                tracing::error!("math worker failed: {e}");
                fallback
                    .into_iter()
                    .map(|(id, source)| {
                        Err(FormulaError {
                            id,
                            source,
                            errors: vec![e.to_string()],
                        })
                    })
                    .collect()
            }
        }
    }
}

fn typeset_formula(formula: &Formula) -> Result<String, FormulaError> {
    let storage = Storage::new();
    let events: Vec<_> = Parser::new(&formula.source, &storage).collect();

    let errors: Vec<String> = events
        .iter()
        .filter_map(|event| event.as_ref().err().map(|e| e.to_string()))
        .collect();
    if !errors.is_empty() {
        return Err(FormulaError {
            id: formula.id,
            source: formula.source.clone(),
            errors,
        });
    }

    let config = RenderConfig {
        display_mode: if formula.display {
            DisplayMode::Block
        } else {
            DisplayMode::Inline
        },
        ..Default::default()
    };

    let mut mathml = String::new();
    push_mathml(&mut mathml, events.into_iter(), config).map_err(|e| FormulaError {
        id: formula.id,
        source: formula.source.clone(),
        errors: vec![e.to_string()],
    })?;
    Ok(mathml)
}
