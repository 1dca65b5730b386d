use std::path::PathBuf;

/// The eight index-type directories plus the stitch synonym files and the
/// document/annotation store, all rooted at `<root>/<set_name>/` (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IndexType {
    Unigram,
    Bigram,
    Trigram,
    Dependency,
    NerDate,
    Pos,
    Hypernym,
    Stitch,
}

impl IndexType {
    pub const ALL: [IndexType; 8] = [
        IndexType::Unigram,
        IndexType::Bigram,
        IndexType::Trigram,
        IndexType::Dependency,
        IndexType::NerDate,
        IndexType::Pos,
        IndexType::Hypernym,
        IndexType::Stitch,
    ];

    pub fn dir_name(&self) -> &'static str {
        match self {
            IndexType::Unigram => "unigram",
            IndexType::Bigram => "bigram",
            IndexType::Trigram => "trigram",
            IndexType::Dependency => "dependency",
            IndexType::NerDate => "ner_date",
            IndexType::Pos => "pos",
            IndexType::Hypernym => "hypernym",
            IndexType::Stitch => "stitch",
        }
    }

    pub fn parse(name: &str) -> Option<IndexType> {
        IndexType::ALL.into_iter().find(|t| t.dir_name() == name)
    }
}

/// Synonym table kinds, each persisted as its own `.ser` file under
/// `stitch/` (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SynonymKind {
    Date,
    Ner,
    Pos,
    Dependency,
}

impl SynonymKind {
    pub const ALL: [SynonymKind; 4] = [SynonymKind::Date, SynonymKind::Ner, SynonymKind::Pos, SynonymKind::Dependency];

    pub fn file_stem(&self) -> &'static str {
        match self {
            SynonymKind::Date => "date",
            SynonymKind::Ner => "ner",
            SynonymKind::Pos => "pos",
            SynonymKind::Dependency => "dependency",
        }
    }
}

/// Resolves the on-disk layout for one named index set under the
/// configured root (§6 directory layout).
#[derive(Debug, Clone)]
pub struct IndexSetLayout {
    pub root: PathBuf,
    pub set_name: String,
}

impl IndexSetLayout {
    pub fn new(root: impl Into<PathBuf>, set_name: impl Into<String>) -> Self {
        IndexSetLayout { root: root.into(), set_name: set_name.into() }
    }

    pub fn set_dir(&self) -> PathBuf {
        self.root.join(&self.set_name)
    }

    pub fn index_dir(&self, index_type: IndexType) -> PathBuf {
        self.set_dir().join(index_type.dir_name())
    }

    pub fn stitch_dir(&self) -> PathBuf {
        self.set_dir().join("stitch")
    }

    pub fn synonym_file(&self, kind: SynonymKind) -> PathBuf {
        self.stitch_dir().join(format!("{}_synonyms.ser", kind.file_stem()))
    }

    pub fn document_store_file(&self) -> PathBuf {
        self.set_dir().join(format!("{}.db", self.set_name))
    }

    /// The staging directory a builder writes into before the atomic
    /// rename-into-place publish (§5).
    pub fn staging_dir(&self) -> PathBuf {
        self.root.join(format!(".{}.building", self.set_name))
    }

    pub fn lock_file(&self) -> PathBuf {
        self.set_dir().join(".lock")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_type_round_trips_through_dir_name() {
        for t in IndexType::ALL {
            assert_eq!(IndexType::parse(t.dir_name()), Some(t));
        }
        assert_eq!(IndexType::parse("bogus"), None);
    }

    #[test]
    fn layout_paths_are_rooted_at_set_dir() {
        let layout = IndexSetLayout::new("indexes", "enwiki");
        assert_eq!(layout.set_dir(), PathBuf::from("indexes/enwiki"));
        assert_eq!(layout.index_dir(IndexType::Unigram), PathBuf::from("indexes/enwiki/unigram"));
        assert_eq!(layout.synonym_file(SynonymKind::Ner), PathBuf::from("indexes/enwiki/stitch/ner_synonyms.ser"));
        assert_eq!(layout.document_store_file(), PathBuf::from("indexes/enwiki/enwiki.db"));
    }
}
