use triage_core::types::{Category, RetrievedDocument, TopicFilter};

const INSTRUCTION: &str =
    "Using the above context, please provide a clear and concise answer to the user's query.";

/// Builds the grounding request for answer generation. Output depends only on
/// the inputs, byte for byte.
#[derive(Debug, Clone, Copy, Default)]
pub struct EvidenceAssembler;

impl EvidenceAssembler {
    pub fn new() -> Self {
        Self
    }

    /// The scope sentence follows the raw flags: a both-false filter searched
    /// everything but is described generically.
    pub fn assemble(
        &self,
        query: &str,
        filter: &TopicFilter,
        docs: &[RetrievedDocument],
    ) -> String {
        let mut parts = Vec::with_capacity(docs.len() + 3);
        parts.push(format!("User query: '{query}'\n"));

        let described: Vec<&str> = Category::ALL
            .into_iter()
            .filter(|c| filter.flag(*c))
            .map(|c| c.description())
            .collect();
        if described.is_empty() {
            parts.push("Here are the relevant documents.\n".to_string());
        } else {
            let scope = described.join(" and ");
            parts.push(format!("Here are the relevant documents about {scope}.\n"));
        }

        for (i, doc) in docs.iter().enumerate() {
            parts.push(format!("Doc {}:\n{}\n", i + 1, doc.content));
        }
        parts.push(INSTRUCTION.to_string());
        parts.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, content: &str, category: Category) -> RetrievedDocument {
        RetrievedDocument { id: id.into(), content: content.into(), category, score: 0.0 }
    }

    #[test]
    fn exact_template_for_both_categories() {
        let docs = vec![
            doc("1", "Login is slow.", Category::Feedbacks),
            doc("2", "Crash on save.", Category::Bugs),
        ];
        let filter = TopicFilter::new(true, true, "both");
        let out = EvidenceAssembler::new().assemble("why slow?", &filter, &docs);
        assert_eq!(
            out,
            "User query: 'why slow?'\n\n\
             Here are the relevant documents about customer feedback and experiences and bug reports and proposed fixes.\n\n\
             Doc 1:\nLogin is slow.\n\n\
             Doc 2:\nCrash on save.\n\n\
             Using the above context, please provide a clear and concise answer to the user's query."
        );
    }

    #[test]
    fn neither_flag_uses_generic_sentence() {
        let filter = TopicFilter::new(false, false, "none");
        let out = EvidenceAssembler::new().assemble("q", &filter, &[]);
        assert_eq!(
            out,
            "User query: 'q'\n\nHere are the relevant documents.\n\n\
             Using the above context, please provide a clear and concise answer to the user's query."
        );
    }

    #[test]
    fn single_category_sentence() {
        let filter = TopicFilter::new(false, true, "bugs");
        let out = EvidenceAssembler::new().assemble("q", &filter, &[]);
        assert!(out.contains("about bug reports and proposed fixes.\n"));
        assert!(!out.contains("customer feedback"));
    }

    #[test]
    fn ordinals_follow_retrieval_order() {
        let docs: Vec<_> = ["c", "a", "b"].iter().map(|c| doc(c, c, Category::Bugs)).collect();
        let filter = TopicFilter::new(false, true, "bugs");
        let out = EvidenceAssembler::new().assemble("q", &filter, &docs);
        assert_eq!(out.matches("Doc ").count(), 3);
        let p1 = out.find("Doc 1:\nc\n").unwrap();
        let p2 = out.find("Doc 2:\na\n").unwrap();
        let p3 = out.find("Doc 3:\nb\n").unwrap();
        assert!(p1 < p2 && p2 < p3);
    }

    #[test]
    fn idempotent() {
        let docs = vec![doc("1", "x", Category::Feedbacks)];
        let filter = TopicFilter::new(true, false, "fb");
        let a = EvidenceAssembler::new();
        assert_eq!(a.assemble("q", &filter, &docs), a.assemble("q", &filter, &docs));
    }
}
