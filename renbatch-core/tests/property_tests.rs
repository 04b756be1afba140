use renbatch_core::{
    Conflict, Context, CopyError, Engine, FileStat, FileSystem, History, MAX_NAME_LEN, Pipeline, RenameMapping,
    RenameStep, Rule, sanitize, split_extension,
};
use proptest::prelude::*;
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

// Mock FS for testing planning without hitting disk
pub struct MockFS {
    files: HashSet<PathBuf>,
    dirs: HashSet<PathBuf>,
}

impl MockFS {
    fn new(files: &[&str]) -> Self {
        Self {
            files: files.iter().map(PathBuf::from).collect(),
            dirs: ["/", "/data", "/out"].iter().map(PathBuf::from).collect(),
        }
    }
}

impl FileSystem for MockFS {
    fn exists(&self, path: &Path) -> bool {
        self.files.contains(path) || self.dirs.contains(path)
    }
    fn is_dir(&self, path: &Path) -> bool {
        self.dirs.contains(path)
    }
    fn rename(&self, _from: &Path, _to: &Path) -> io::Result<()> {
        Ok(())
    }
    fn copy_with_metadata(&self, _from: &Path, _to: &Path) -> Result<(), CopyError> {
        Ok(())
    }
    fn remove_file(&self, _path: &Path) -> io::Result<()> {
        Ok(())
    }
    fn create_dir_all(&self, _path: &Path) -> io::Result<()> {
        Ok(())
    }
    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        Ok(path.to_path_buf())
    }
    fn read_dir(&self, _path: &Path) -> io::Result<Vec<PathBuf>> {
        Ok(self.files.iter().cloned().collect())
    }
    fn stat(&self, _path: &Path) -> io::Result<FileStat> {
        Ok(FileStat { is_file: true, size: 0, modified: SystemTime::UNIX_EPOCH })
    }
    fn is_case_sensitive(&self, _path: &Path) -> bool {
        true
    }
}

const RESERVED: &[&str] = &["CON", "PRN", "AUX", "NUL", "COM1", "COM5", "COM9", "LPT1", "LPT7"];

proptest! {
    #[test]
    fn test_long_names_fit_and_keep_extension(
        stem in "[a-z0-9 _-]{256,400}",
        ext in "[a-z0-9]{1,8}",
    ) {
        let name = format!("{}.{}", stem, ext);
        let out = sanitize(&name);
        prop_assert!(out.chars().count() <= MAX_NAME_LEN);
        prop_assert_eq!(split_extension(&out).1, Some(ext.as_str()));
    }

    #[test]
    fn test_sanitized_names_are_clean(name in ".{0,300}") {
        let out = sanitize(&name);
        prop_assert!(!out.is_empty());
        prop_assert!(!out.starts_with('.'));
        prop_assert!(!out.contains(['"', '*', ':', '<', '>', '?', '|', '/', '\\']));
    }

    #[test]
    fn test_reserved_names_get_suffix(
        index in 0..RESERVED.len(),
        lower in any::<bool>(),
        ext in proptest::option::of("[a-z]{1,4}"),
    ) {
        let stem = if lower { RESERVED[index].to_lowercase() } else { RESERVED[index].to_string() };
        let name = match &ext {
            Some(ext) => format!("{}.{}", stem, ext),
            None => stem,
        };
        prop_assert_eq!(sanitize(&name), format!("{}_renamed", name));
    }

    #[test]
    fn test_prefix_suffix_preserves_extension(base in "[a-z]{1,20}", ext in "[a-z]{1,5}") {
        let name = format!("{}.{}", base, ext);
        let rule = Rule::PrefixSuffix { prefix: "p_".to_string(), suffix: "_s".to_string() };
        let out = rule.execute(&name, &Context::default()).unwrap();
        prop_assert_eq!(out, format!("p_{}_s.{}", base, ext));
    }

    #[test]
    fn test_numbering_follows_list_order(count in 1usize..20, start in 0u64..1000, digits in 1usize..6) {
        let fs = MockFS::new(&[]);
        let engine = Engine::new(&fs);
        let files: Vec<PathBuf> = (0..count).map(|i| PathBuf::from(format!("/data/f{i}.dat"))).collect();
        let pipeline = Pipeline::single(Rule::Numbering {
            prefix: String::new(),
            suffix: String::new(),
            start,
            digits,
        });

        let mappings = engine.transform(&files, &pipeline).unwrap().mappings;
        for (i, mapping) in mappings.iter().enumerate() {
            prop_assert_eq!(&mapping.source, &files[i]);
            let expected = format!("{:0width$}.dat", start + i as u64, width = digits);
            prop_assert_eq!(&mapping.new_name, &expected);
        }
    }

    #[test]
    fn test_plan_detects_all_collisions(count in 2usize..10) {
        let fs = MockFS::new(&[]);
        let engine = Engine::new(&fs);

        // Everything renames to the same name
        let files: Vec<PathBuf> = (0..count).map(|i| PathBuf::from(format!("/data/n{i}"))).collect();
        let pipeline = Pipeline::single(Rule::RegexReplace {
            pattern: "^.*$".to_string(),
            replacement: "constant".to_string(),
        });
        let mappings = engine.transform(&files, &pipeline).unwrap().mappings;
        let plan = engine.plan(&mappings, None).unwrap();

        prop_assert_eq!(plan.accepted.len(), 1);
        prop_assert_eq!(plan.accepted[0].index, 0);
        prop_assert_eq!(plan.rejected.len(), count - 1);
        for (offset, rejection) in plan.rejected.iter().enumerate() {
            prop_assert_eq!(rejection.index, offset + 1);
            prop_assert!(matches!(rejection.conflict, Conflict::DuplicateTarget { .. }), "unexpected conflict");
        }
    }

    #[test]
    fn test_history_round_trip(pairs in proptest::collection::vec(("[a-z]{1,8}", "[a-z]{1,8}"), 1..10)) {
        let fs = MockFS::new(&[]);
        let batch: Vec<RenameStep> = pairs
            .iter()
            .map(|(a, b)| RenameStep::new(format!("/data/{a}"), format!("/out/{b}")))
            .collect();

        let mut history = History::new();
        history.record(batch.clone());
        let undo = history.undo(&fs).unwrap();
        prop_assert_eq!(undo.len(), batch.len());
        let redo = history.redo(&fs).unwrap();
        prop_assert_eq!(redo, batch);
    }
}

#[test]
fn test_plan_existing_file_is_rejected_only_when_unrelated() {
    let fs = MockFS::new(&["/data/a.txt", "/data/b.txt", "/out/a.txt"]);
    let engine = Engine::new(&fs);
    let mappings = vec![
        RenameMapping::new("/data/a.txt", "a.txt"),
        RenameMapping::new("/data/b.txt", "a.txt"),
    ];

    // In place: the first mapping is a no-op onto itself, the second collides with it
    let plan = engine.plan(&mappings, None).unwrap();
    assert_eq!(plan.accepted.len(), 1);
    assert!(matches!(plan.rejected[0].conflict, Conflict::DuplicateTarget { .. }));

    // Into /out: a.txt is already taken there by an unrelated file, and a
    // rejected mapping never claims its destination
    let plan = engine.plan(&mappings, Some(Path::new("/out"))).unwrap();
    assert!(plan.accepted.is_empty());
    assert!(matches!(plan.rejected[0].conflict, Conflict::TargetExists { .. }));
    assert!(matches!(plan.rejected[1].conflict, Conflict::TargetExists { .. }));
}
