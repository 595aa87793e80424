use crate::RankedChunk;

/// Joins reranked chunk texts with newlines, in the order the reranker
/// returned them. An empty selection produces an empty context.
pub fn assemble_context(chunks: &[RankedChunk]) -> String {
    chunks
        .iter()
        .map(|chunk| chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranked(text: &str, rank: usize) -> RankedChunk {
        RankedChunk {
            index: rank,
            text: text.to_owned(),
            relevance: 0.5,
            rank,
        }
    }

    #[test]
    fn preserves_reranked_order() {
        let chunks = vec![ranked("second topic", 1), ranked("first topic", 2)];
        assert_eq!(assemble_context(&chunks), "second topic\nfirst topic");
    }

    #[test]
    fn empty_selection_yields_empty_context() {
        assert_eq!(assemble_context(&[]), "");
    }

    #[test]
    fn single_chunk_has_no_separator() {
        let chunks = vec![ranked("only one", 1)];
        assert_eq!(assemble_context(&chunks), "only one");
    }
}
