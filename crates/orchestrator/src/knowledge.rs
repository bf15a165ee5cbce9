//! Offline knowledge bank used when every backend has failed.
//!
//! Answers are canned Markdown keyed by a coarse topic. Topic detection sits
//! behind [`TopicClassifier`] so keyword lists can change without touching
//! orchestration.

use std::collections::BTreeMap;

use crate::keyword::{Keyword, words};

/// Coarse subject of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Topic {
    Sequence,
    Protein,
    Alignment,
    Phylogenetics,
    Expression,
    General,
}

impl Topic {
    /// Topics in the order classifiers check them.
    pub const SPECIFIC: [Topic; 5] = [
        Topic::Alignment,
        Topic::Phylogenetics,
        Topic::Expression,
        Topic::Protein,
        Topic::Sequence,
    ];
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sequence => write!(f, "sequence"),
            Self::Protein => write!(f, "protein"),
            Self::Alignment => write!(f, "alignment"),
            Self::Phylogenetics => write!(f, "phylogenetics"),
            Self::Expression => write!(f, "expression"),
            Self::General => write!(f, "general"),
        }
    }
}

pub trait TopicClassifier: Send + Sync {
    fn classify(&self, query: &str) -> Topic;
}

/// Classifies by counting keyword hits per topic; the topic with the most
/// hits wins, earlier topics in [`Topic::SPECIFIC`] winning ties. No hits
/// means [`Topic::General`].
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    keywords: BTreeMap<Topic, Vec<Keyword>>,
}

impl KeywordClassifier {
    /// An empty classifier; everything is `General`.
    pub fn empty() -> Self {
        Self {
            keywords: BTreeMap::new(),
        }
    }

    /// Add keywords for a topic. Matching is case-insensitive on word
    /// boundaries: a keyword must start a word of the query, so stems such
    /// as `phylogen` cover their inflections.
    pub fn with_keywords<I, S>(mut self, topic: Topic, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let list = self.keywords.entry(topic).or_default();
        for keyword in keywords.into_iter().filter_map(|k| Keyword::parse(k.as_ref())) {
            if !list.contains(&keyword) {
                list.push(keyword);
            }
        }
        self
    }

    fn hits(&self, topic: Topic, query_words: &[String]) -> usize {
        self.keywords
            .get(&topic)
            .map(|list| list.iter().filter(|k| k.matches(query_words)).count())
            .unwrap_or(0)
    }
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::empty()
            .with_keywords(
                Topic::Alignment,
                ["align", "blast", "msa", "clustal", "muscle", "smith-waterman", "needleman"],
            )
            .with_keywords(
                Topic::Phylogenetics,
                ["phylogen", "tree", "clade", "evolution", "newick", "ancestor", "bootstrap"],
            )
            .with_keywords(
                Topic::Expression,
                ["expression", "rna-seq", "rnaseq", "deseq", "transcript", "differential", "microarray"],
            )
            .with_keywords(
                Topic::Protein,
                ["protein", "amino acid", "peptide", "pdb", "fold", "residue", "uniprot"],
            )
            .with_keywords(
                Topic::Sequence,
                ["sequence", "dna", "fasta", "fastq", "gc content", "nucleotide", "codon", "genome"],
            )
    }
}

impl TopicClassifier for KeywordClassifier {
    fn classify(&self, query: &str) -> Topic {
        let query_words = words(query);
        let mut best = (Topic::General, 0);
        for topic in Topic::SPECIFIC {
            let hits = self.hits(topic, &query_words);
            if hits > best.1 {
                best = (topic, hits);
            }
        }
        best.0
    }
}

/// Deterministic answers for when no backend is reachable.
pub struct KnowledgeBank {
    classifier: Box<dyn TopicClassifier>,
}

impl KnowledgeBank {
    pub fn new(classifier: Box<dyn TopicClassifier>) -> Self {
        Self { classifier }
    }

    pub fn classify(&self, query: &str) -> Topic {
        self.classifier.classify(query)
    }

    /// Never fails and does no I/O.
    pub fn respond(&self, query: &str) -> String {
        let topic = self.classify(query);
        tracing::debug!(topic = %topic, "Answering from knowledge bank");
        answer_for(topic).to_string()
    }
}

impl Default for KnowledgeBank {
    fn default() -> Self {
        Self::new(Box::new(KeywordClassifier::default()))
    }
}

fn answer_for(topic: Topic) -> &'static str {
    match topic {
        Topic::Sequence => SEQUENCE_ANSWER,
        Topic::Protein => PROTEIN_ANSWER,
        Topic::Alignment => ALIGNMENT_ANSWER,
        Topic::Phylogenetics => PHYLOGENETICS_ANSWER,
        Topic::Expression => EXPRESSION_ANSWER,
        Topic::General => GENERAL_ANSWER,
    }
}

const SEQUENCE_ANSWER: &str = "\
## Sequence analysis

**Common first steps**
- Check quality with FastQC before anything else; trim adapters and low-quality tails.
- GC content = (G + C) / total bases. Values far from the organism's norm hint at contamination.
- Translate in all six reading frames when looking for ORFs.

**Useful tools**
- `seqkit stats` for quick summaries of FASTA/FASTQ files
- `samtools faidx` for random access into large references
- Biopython's `SeqIO` for scripted parsing

**Note**
The assistant's live backends are unavailable right now; this is a general reference answer.";

const PROTEIN_ANSWER: &str = "\
## Protein analysis

**Structure and function**
- Search UniProt for curated annotation and known domains.
- Use InterProScan or Pfam to identify conserved domains in a new sequence.
- AlphaFold DB has predicted structures for most of UniProt; check it before modelling.

**Properties**
- Molecular weight and pI can be computed with ExPASy ProtParam.
- Hydrophobicity plots (Kyte-Doolittle) help spot transmembrane segments.

**Note**
The assistant's live backends are unavailable right now; this is a general reference answer.";

const ALIGNMENT_ANSWER: &str = "\
## Sequence alignment

**Pairwise**
- Global (Needleman-Wunsch) when sequences are similar over their full length.
- Local (Smith-Waterman) when looking for shared regions or domains.
- BLAST for fast heuristic search against large databases.

**Multiple**
- MAFFT or Clustal Omega for most multiple alignments; MUSCLE for smaller sets.
- Inspect the result visually (Jalview) and trim poorly aligned columns before downstream use.

**Note**
The assistant's live backends are unavailable right now; this is a general reference answer.";

const PHYLOGENETICS_ANSWER: &str = "\
## Phylogenetics

**Workflow**
1. Collect homologous sequences and build a multiple alignment.
2. Choose a substitution model (ModelFinder, jModelTest).
3. Infer the tree with maximum likelihood (IQ-TREE, RAxML) or Bayesian methods (MrBayes).
4. Assess support with bootstrap or posterior probabilities.

**Output**
- Trees are usually exchanged in Newick format; view them with iTOL or FigTree.

**Note**
The assistant's live backends are unavailable right now; this is a general reference answer.";

const EXPRESSION_ANSWER: &str = "\
## Gene expression

**RNA-seq pipeline**
- Quality control and trimming, then alignment (STAR, HISAT2) or pseudo-alignment (Salmon, kallisto).
- Count reads per gene and normalise for library size.
- Differential expression with DESeq2 or edgeR; correct for multiple testing.

**Interpretation**
- Use volcano and MA plots to review results.
- Follow up with enrichment analysis (GO, KEGG).

**Note**
The assistant's live backends are unavailable right now; this is a general reference answer.";

const GENERAL_ANSWER: &str = "\
## Assistant temporarily limited

The assistant cannot reach its analysis backends at the moment, so it cannot give a detailed answer to this question.

**What you can do**
- Try again in a few minutes.
- Ask about a specific topic (sequences, proteins, alignment, phylogenetics, expression) for reference material that is available offline.
- Break a complex question into smaller steps.";
