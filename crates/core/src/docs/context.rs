use crate::docs::DocResult;

const DOC_SEPARATOR: &str = "\n\n---\n\n";

/// Renders ranked docs into the numbered "Documentation Context" block the
/// prompts embed.
pub fn build_doc_context(docs: &[DocResult]) -> String {
    docs.iter()
        .enumerate()
        .map(|(index, doc)| render_doc(index + 1, doc))
        .collect::<Vec<_>>()
        .join(DOC_SEPARATOR)
}

fn render_doc(position: usize, doc: &DocResult) -> String {
    let mut part = format!("[{position}] {}\n", doc.title);
    if !doc.link.is_empty() {
        part.push_str(&format!("URL: {}\n", doc.link));
    }
    part.push_str(doc.body());

    if !doc.yaml_examples.is_empty() {
        part.push_str("\n\nYAML examples from this doc:\n");
        for block in &doc.yaml_examples {
            part.push_str(&format!("\n```yaml\n{}\n```\n", block.trim()));
        }
    }

    part
}
