use atomtag_core::content::{digest_file, split_reference};
use atomtag_core::model::core_types::{
    FILENAME, FILEREF, FILEREF_REMOTE, FILEREF_REMOTE_LOCATION, FILETYPE_IMAGE, FILETYPE_UNKNOWN,
};
use atomtag_core::{ArchiveConfig, ArchiveService, Atom, ErrorKind, TypeFilter};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

struct Fixture {
    _root: TempDir,
    sources: PathBuf,
    config: ArchiveConfig,
}

fn fixture() -> Fixture {
    let root = tempfile::tempdir().unwrap();
    let sources = root.path().join("sources");
    fs::create_dir_all(&sources).unwrap();
    let mut config = ArchiveConfig::with_base_dir(root.path().join("archive"));
    config
        .repositories
        .insert("nas".to_string(), root.path().join("nas"));
    Fixture {
        _root: root,
        sources,
        config,
    }
}

fn source(fixture: &Fixture, name: &str, bytes: &[u8]) -> PathBuf {
    let path = fixture.sources.join(name);
    fs::write(&path, bytes).unwrap();
    path
}

fn expected_relative(path: &Path) -> String {
    let digest = digest_file(path).unwrap();
    format!("{}/{}/{}", &digest[..2], &digest[2..4], &digest[4..])
}

#[test]
fn generic_import_creates_filename_and_reference_atoms() {
    let fixture = fixture();
    let service = ArchiveService::open(&fixture.config).unwrap();
    let file = source(&fixture, "notes.txt", b"meeting notes");

    let molecules = service.import_file(&file, None).unwrap();
    assert_eq!(molecules.len(), 1);
    let molecule = &molecules[0];

    assert!(molecule.is_persistent());
    assert_eq!(molecule.tags(), ["generic-file".to_string()]);
    assert_eq!(molecule.atoms().len(), 2);
    assert_eq!(molecule.atoms_of_type(FILENAME)[0].data(), "notes.txt");

    let reference = molecule.atoms_of_type(FILEREF)[0];
    assert_eq!(reference.data(), expected_relative(&file));
    assert!(reference.has_type(FILETYPE_UNKNOWN));
    assert!(!reference.has_type(FILEREF_REMOTE));
    assert!(fixture.config.base_dir.join(reference.data()).is_file());
}

#[test]
fn image_files_go_to_the_image_importer() {
    let fixture = fixture();
    let service = ArchiveService::open(&fixture.config).unwrap();
    let file = source(&fixture, "harbour.JPG", b"\xff\xd8\xff fake jpeg");

    let molecule = service.import_file(&file, None).unwrap().remove(0);
    assert_eq!(
        molecule.tags(),
        ["generic-file".to_string(), "image".to_string()]
    );
    assert!(molecule.atoms_of_type(FILEREF)[0].has_type(FILETYPE_IMAGE));
}

#[test]
fn remote_import_adds_location_atom() {
    let fixture = fixture();
    let service = ArchiveService::open(&fixture.config).unwrap();
    let file = source(&fixture, "film.mkv", b"remote payload");

    let molecule = service.import_file(&file, Some("nas")).unwrap().remove(0);
    assert_eq!(molecule.atoms().len(), 3);
    let reference = molecule.atoms_of_type(FILEREF)[0];
    assert!(reference.has_type(FILEREF_REMOTE));
    assert_eq!(reference.data(), format!("nas:{}", expected_relative(&file)));
    assert_eq!(molecule.atoms_of_type(FILEREF_REMOTE_LOCATION)[0].data(), "nas");
    let (repository, relative) = split_reference(reference.data());
    assert_eq!(repository, Some("nas"));
    assert!(fixture.config.repositories["nas"].join(relative).is_file());
    assert!(!fixture.config.base_dir.join(relative).exists());

    let viewer = service.handlers().viewer(&molecule).unwrap();
    assert_eq!(viewer.unique_id(), "atomtag-remoteviewer");
    let mut out = Vec::new();
    service.render(molecule.id(), &mut out).unwrap();
    assert!(String::from_utf8(out).unwrap().contains("available:"));

    let err = service.import_file(&file, Some("usb")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn reimporting_identical_content_shares_atoms() {
    let fixture = fixture();
    let service = ArchiveService::open(&fixture.config).unwrap();
    let first = source(&fixture, "a.txt", b"same");
    let second = source(&fixture, "b.txt", b"same");

    let one = service.import_file(&first, None).unwrap().remove(0);
    let two = service.import_file(&second, None).unwrap().remove(0);

    assert_ne!(one.id(), two.id());
    assert_eq!(
        one.atoms_of_type(FILEREF)[0].id(),
        two.atoms_of_type(FILEREF)[0].id()
    );
    assert_eq!(
        service
            .atoms_by_type(&[FILEREF.to_string()], TypeFilter::Include)
            .unwrap()
            .len(),
        1
    );
}

fn assert_local_molecule_usable(service: &ArchiveService, fixture: &Fixture, id: i64) {
    let local = service.molecule(id).unwrap();
    let reference = local.atoms_of_type(FILEREF)[0];
    assert!(!reference.has_type(FILEREF_REMOTE));
    assert!(local.atoms_of_type(FILEREF_REMOTE_LOCATION).is_empty());
    assert_eq!(
        service.handlers().viewer(&local).unwrap().unique_id(),
        "atomtag-genericviewer"
    );

    let target = fixture.sources.join(format!("export-{id}.bin"));
    service.export(id, &target).unwrap();
    assert_eq!(fs::read(&target).unwrap(), b"same bytes");

    let mut out = Vec::new();
    service.render(id, &mut out).unwrap();
    assert!(String::from_utf8(out).unwrap().contains(" file: "));
}

fn assert_remote_molecule_usable(service: &ArchiveService, id: i64) {
    let remote = service.molecule(id).unwrap();
    assert!(remote.atoms_of_type(FILEREF)[0].has_type(FILEREF_REMOTE));
    assert_eq!(
        service.handlers().viewer(&remote).unwrap().unique_id(),
        "atomtag-remoteviewer"
    );
    let mut out = Vec::new();
    service.render(id, &mut out).unwrap();
    assert!(String::from_utf8(out).unwrap().contains(" available: "));
}

#[test]
fn same_bytes_remote_then_local_stay_separate() {
    let fixture = fixture();
    let service = ArchiveService::open(&fixture.config).unwrap();
    let file = source(&fixture, "clip.bin", b"same bytes");

    let remote = service.import_file(&file, Some("nas")).unwrap().remove(0);
    let local = service.import_file(&file, None).unwrap().remove(0);

    assert_ne!(
        remote.atoms_of_type(FILEREF)[0].id(),
        local.atoms_of_type(FILEREF)[0].id()
    );
    assert_local_molecule_usable(&service, &fixture, local.id());
    assert_remote_molecule_usable(&service, remote.id());
}

#[test]
fn same_bytes_local_then_remote_stay_separate() {
    let mut fixture = fixture();
    fixture.config.purge_content_on_remove = true;
    let service = ArchiveService::open(&fixture.config).unwrap();
    let file = source(&fixture, "clip.bin", b"same bytes");

    let local = service.import_file(&file, None).unwrap().remove(0);
    let remote = service.import_file(&file, Some("nas")).unwrap().remove(0);

    assert_local_molecule_usable(&service, &fixture, local.id());
    assert_remote_molecule_usable(&service, remote.id());

    let report = service.remove_molecule(local.id()).unwrap();
    assert_eq!(report.released_content, vec![expected_relative(&file)]);
    assert!(!fixture.config.base_dir.join(expected_relative(&file)).exists());
    assert!(fixture.config.repositories["nas"]
        .join(expected_relative(&file))
        .is_file());

    let report = service.remove_molecule(remote.id()).unwrap();
    assert!(report.released_content.is_empty());
}

#[test]
fn list_show_and_retag() {
    let fixture = fixture();
    let service = ArchiveService::open(&fixture.config).unwrap();
    let file = source(&fixture, "notes.txt", b"meeting notes");
    let molecule = service.import_file(&file, None).unwrap().remove(0);

    let lines = service.list(&[], 80).unwrap();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("[generic-file]"));
    assert!(lines[0].contains("notes.txt"));

    let (retagged, report) = service
        .retag(
            molecule.id(),
            &["work".to_string()],
            &["generic-file".to_string()],
        )
        .unwrap();
    assert_eq!(retagged.tags(), ["work".to_string()]);
    assert_eq!(report.tags_linked, 1);
    assert_eq!(report.tags_unlinked, 1);
    assert!(service.list(&["generic-file".to_string()], 80).unwrap().is_empty());

    let err = service
        .retag(molecule.id(), &[], &["work".to_string()])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    let verbose = service.show(molecule.id(), 80).unwrap();
    assert_eq!(verbose.lines().count(), 4);
    assert_eq!(service.tags().unwrap(), vec!["generic-file".to_string(), "work".to_string()]);

    let pruned = service.prune().unwrap();
    assert_eq!(pruned.tags_deleted, 1);
    assert_eq!(service.tags().unwrap(), vec!["work".to_string()]);
}

#[test]
fn reconcile_applies_an_edited_molecule() {
    let fixture = fixture();
    let service = ArchiveService::open(&fixture.config).unwrap();
    let file = source(&fixture, "notes.txt", b"meeting notes");
    let molecule = service.import_file(&file, None).unwrap().remove(0);

    let title = Atom::builder()
        .with_data("Quarterly planning")
        .unwrap()
        .with_type("title")
        .unwrap()
        .build()
        .unwrap();
    let desired = molecule
        .modify()
        .with_atom(title)
        .unwrap()
        .with_tag("work")
        .unwrap()
        .build()
        .unwrap();

    let report = service.reconcile(&desired).unwrap();
    assert_eq!(report.atoms_linked, 1);
    assert_eq!(report.tags_linked, 1);

    let reloaded = service.molecule(molecule.id()).unwrap();
    assert_eq!(reloaded.atoms().len(), 3);
    assert_eq!(reloaded.atoms_of_type("title")[0].data(), "Quarterly planning");
    assert!(service.list(&[], 80).unwrap()[0].contains("Quarterly planning"));
    assert!(service.reconcile(&reloaded).unwrap().is_noop());
}

#[test]
fn export_copies_content_to_target() {
    let fixture = fixture();
    let service = ArchiveService::open(&fixture.config).unwrap();
    let file = source(&fixture, "notes.txt", b"meeting notes");
    let molecule = service.import_file(&file, None).unwrap().remove(0);

    let target = fixture.sources.join("out").join("copy.txt");
    service.export(molecule.id(), &target).unwrap();
    assert_eq!(fs::read(&target).unwrap(), b"meeting notes");

    assert_eq!(service.export(404, &target).unwrap_err().kind(), ErrorKind::NotFound);
}

#[test]
fn removal_purges_content_only_when_configured() {
    let mut fixture = fixture();
    fixture.config.purge_content_on_remove = true;
    let service = ArchiveService::open(&fixture.config).unwrap();
    let file = source(&fixture, "notes.txt", b"meeting notes");
    let molecule = service.import_file(&file, None).unwrap().remove(0);
    let stored = fixture.config.base_dir.join(expected_relative(&file));
    assert!(stored.is_file());

    let report = service.remove_molecule(molecule.id()).unwrap();
    assert_eq!(report.atoms_deleted, 2);
    assert!(!stored.exists());
    assert_eq!(service.molecule(molecule.id()).unwrap_err().kind(), ErrorKind::NotFound);
}

#[test]
fn removal_keeps_content_by_default() {
    let fixture = fixture();
    let service = ArchiveService::open(&fixture.config).unwrap();
    let file = source(&fixture, "notes.txt", b"meeting notes");
    let molecule = service.import_file(&file, None).unwrap().remove(0);

    service.remove_molecule(molecule.id()).unwrap();
    assert!(fixture
        .config
        .base_dir
        .join(expected_relative(&file))
        .is_file());
    assert!(service.molecules(&[]).unwrap().is_empty());
}

#[test]
fn importing_a_missing_file_fails_fast() {
    let fixture = fixture();
    let service = ArchiveService::open(&fixture.config).unwrap();

    let err = service
        .import_file(&fixture.sources.join("ghost.txt"), None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}
