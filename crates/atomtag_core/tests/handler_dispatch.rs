use atomtag_core::content::{ContentStore, RepositorySet};
use atomtag_core::{
    Atom, Catalog, HandlerError, HandlerRegistry, Molecule, MoleculeExporter, MoleculeHandler,
    MoleculeImporter, MoleculeViewer, RegistryError, Verbosity, ORDINAL_RESERVED,
};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

struct ExtensionImporter {
    id: &'static str,
    ordinal: i32,
    extension: &'static str,
}

impl MoleculeHandler for ExtensionImporter {
    fn unique_id(&self) -> &str {
        self.id
    }

    fn ordinal(&self) -> i32 {
        self.ordinal
    }
}

impl MoleculeImporter for ExtensionImporter {
    fn can_handle(&self, file: &Path) -> bool {
        file.extension().and_then(|ext| ext.to_str()) == Some(self.extension)
    }

    fn import_file(
        &self,
        _catalog: &dyn Catalog,
        _file: &Path,
        _repository: Option<&str>,
    ) -> Result<Vec<Molecule>, HandlerError> {
        Ok(Vec::new())
    }
}

struct TaggedViewer;

impl MoleculeHandler for TaggedViewer {
    fn unique_id(&self) -> &str {
        "tagged-viewer"
    }

    fn ordinal(&self) -> i32 {
        3
    }
}

impl MoleculeViewer for TaggedViewer {
    fn can_handle(&self, molecule: &Molecule) -> bool {
        molecule.has_tag("special")
    }

    fn text_representation(&self, molecule: &Molecule, _: usize, _: Verbosity) -> String {
        format!("special {}", molecule.id())
    }

    fn show_molecule(&self, _: &Molecule, out: &mut dyn Write) -> Result<(), HandlerError> {
        writeln!(out, "special").map_err(|source| HandlerError::Io {
            path: "<test>".into(),
            source,
        })
    }
}

struct NeverExporter;

impl MoleculeHandler for NeverExporter {
    fn unique_id(&self) -> &str {
        "never-exporter"
    }

    fn ordinal(&self) -> i32 {
        4
    }
}

impl MoleculeExporter for NeverExporter {
    fn can_handle(&self, _: &Molecule) -> bool {
        false
    }

    fn export_to_file(&self, _: &Molecule, _: &Path) -> Result<(), HandlerError> {
        Ok(())
    }
}

struct AnyExporter(&'static str);

impl MoleculeHandler for AnyExporter {
    fn unique_id(&self) -> &str {
        self.0
    }

    fn ordinal(&self) -> i32 {
        50
    }
}

impl MoleculeExporter for AnyExporter {
    fn can_handle(&self, _: &Molecule) -> bool {
        true
    }

    fn export_to_file(&self, _: &Molecule, _: &Path) -> Result<(), HandlerError> {
        Ok(())
    }
}

fn repositories(root: &Path) -> Arc<RepositorySet> {
    Arc::new(RepositorySet::new(ContentStore::new(root)))
}

fn importer(id: &'static str, ordinal: i32, extension: &'static str) -> Box<ExtensionImporter> {
    Box::new(ExtensionImporter {
        id,
        ordinal,
        extension,
    })
}

fn molecule(tag: &str) -> Molecule {
    Molecule::builder()
        .with_atom(
            Atom::builder()
                .with_data("x")
                .unwrap()
                .with_type("title")
                .unwrap()
                .build()
                .unwrap(),
        )
        .unwrap()
        .with_tag(tag)
        .unwrap()
        .build()
        .unwrap()
}

#[test]
fn dispatch_picks_lowest_accepting_ordinal_before_fallback() {
    let dir = tempfile::tempdir().unwrap();
    let mut registry = HandlerRegistry::with_fallbacks(repositories(dir.path()));
    registry.register_importer(importer("first", 1, "one")).unwrap();
    registry.register_importer(importer("fifth", 5, "five")).unwrap();

    let five = dir.path().join("data.five");
    std::fs::write(&five, b"5").unwrap();
    assert_eq!(registry.importer(&five).unwrap().unique_id(), "fifth");

    let other = dir.path().join("data.txt");
    std::fs::write(&other, b"?").unwrap();
    let fallback = registry.importer(&other).unwrap();
    assert_eq!(fallback.ordinal(), ORDINAL_RESERVED);
    assert_eq!(fallback.unique_id(), "atomtag-genericimporter");
}

#[test]
fn next_importer_defers_past_the_named_handler() {
    let dir = tempfile::tempdir().unwrap();
    let mut registry = HandlerRegistry::with_fallbacks(repositories(dir.path()));
    registry.register_importer(importer("first", 1, "dat")).unwrap();
    registry.register_importer(importer("second", 2, "dat")).unwrap();

    let file = dir.path().join("x.dat");
    std::fs::write(&file, b"x").unwrap();
    assert_eq!(registry.importer(&file).unwrap().unique_id(), "first");
    assert_eq!(registry.next_importer(&file, "first").unwrap().unique_id(), "second");
    assert_eq!(
        registry.next_importer(&file, "second").unwrap().unique_id(),
        "first"
    );
}

#[test]
fn unreadable_file_fails_before_dispatch() {
    let dir = tempfile::tempdir().unwrap();
    let registry = HandlerRegistry::with_fallbacks(repositories(dir.path()));
    let missing = dir.path().join("missing.txt");

    assert_eq!(
        registry.importer(&missing).err(),
        Some(RegistryError::FileUnreadable(missing.clone()))
    );
    assert!(matches!(
        registry.importer(dir.path()),
        Err(RegistryError::FileUnreadable(_))
    ));
}

#[test]
fn reserved_and_duplicate_ordinals_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut registry = HandlerRegistry::with_fallbacks(repositories(dir.path()));

    let err = registry
        .register_importer(importer("greedy", ORDINAL_RESERVED, "x"))
        .unwrap_err();
    assert_eq!(err, RegistryError::ReservedOrdinal("greedy".to_string()));

    registry.register_importer(importer("first", 1, "x")).unwrap();
    let err = registry
        .register_importer_at(1, importer("again", 9, "x"))
        .unwrap_err();
    assert_eq!(
        err,
        RegistryError::DuplicateOrdinal {
            ordinal: 1,
            existing: "first".to_string()
        }
    );
    assert_eq!(
        registry.importer_ids(),
        vec![
            (1, "first".to_string()),
            (ORDINAL_RESERVED, "atomtag-genericimporter".to_string())
        ]
    );
}

#[test]
fn viewer_dispatch_falls_back_to_generic_viewer() {
    let dir = tempfile::tempdir().unwrap();
    let mut registry = HandlerRegistry::with_fallbacks(repositories(dir.path()));
    registry.register_viewer(Box::new(TaggedViewer)).unwrap();

    let special = molecule("special");
    let plain = molecule("plain");
    assert_eq!(registry.viewer(&special).unwrap().unique_id(), "tagged-viewer");
    assert_eq!(
        registry.next_viewer(&special, "tagged-viewer").unwrap().unique_id(),
        "atomtag-genericviewer"
    );
    assert_eq!(registry.viewer(&plain).unwrap().unique_id(), "atomtag-genericviewer");
}

#[test]
fn exporter_dispatch_has_no_fallback() {
    let dir = tempfile::tempdir().unwrap();
    let mut registry = HandlerRegistry::with_fallbacks(repositories(dir.path()));
    let candidate = molecule("plain");

    assert!(matches!(
        registry.exporter(&candidate),
        Err(RegistryError::NoExporter(_))
    ));
    registry.register_exporter(Box::new(NeverExporter)).unwrap();
    assert!(matches!(
        registry.exporter(&candidate),
        Err(RegistryError::NoExporter(_))
    ));
}

#[test]
fn exporters_registered_at_explicit_ordinals_dispatch_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let mut registry = HandlerRegistry::with_fallbacks(repositories(dir.path()));
    registry
        .register_exporter_at(7, Box::new(AnyExporter("csv-exporter")))
        .unwrap();
    registry
        .register_exporter_at(2, Box::new(AnyExporter("json-exporter")))
        .unwrap();
    let candidate = molecule("plain");

    assert_eq!(registry.exporter(&candidate).unwrap().unique_id(), "json-exporter");
    assert_eq!(
        registry
            .next_exporter(&candidate, "json-exporter")
            .unwrap()
            .unique_id(),
        "csv-exporter"
    );
    assert_eq!(
        registry
            .next_exporter(&candidate, "csv-exporter")
            .unwrap()
            .unique_id(),
        "json-exporter"
    );
    assert_eq!(
        registry.register_exporter_at(ORDINAL_RESERVED, Box::new(AnyExporter("late"))),
        Err(RegistryError::ReservedOrdinal("late".to_string()))
    );
    assert_eq!(
        registry.exporter_ids(),
        vec![
            (2, "json-exporter".to_string()),
            (7, "csv-exporter".to_string())
        ]
    );
}

#[test]
fn built_in_registry_orders_handlers() {
    let dir = tempfile::tempdir().unwrap();
    let registry = HandlerRegistry::new(repositories(dir.path())).unwrap();

    assert_eq!(
        registry.importer_ids(),
        vec![
            (1, "atomtag-imageimporter".to_string()),
            (ORDINAL_RESERVED, "atomtag-genericimporter".to_string())
        ]
    );
    assert_eq!(
        registry.viewer_ids(),
        vec![
            (ORDINAL_RESERVED - 100, "atomtag-remoteviewer".to_string()),
            (ORDINAL_RESERVED, "atomtag-genericviewer".to_string())
        ]
    );
    assert_eq!(
        registry.exporter_ids(),
        vec![(10, "atomtag-contentexporter".to_string())]
    );
}
