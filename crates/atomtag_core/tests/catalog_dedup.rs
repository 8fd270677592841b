use atomtag_core::db::open_db_in_memory;
use atomtag_core::model::core_types::{FILEREF, FILETYPE_UNKNOWN};
use atomtag_core::{Atom, Catalog, ErrorKind, Molecule, SqliteCatalog, TypeFilter};
use rusqlite::Connection;

fn types(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

fn count(conn: &Connection, sql: &str) -> i64 {
    conn.query_row(sql, [], |row| row.get(0)).unwrap()
}

fn atom(data: &str, value: &str) -> Atom {
    Atom::builder()
        .with_data(data)
        .unwrap()
        .with_type(value)
        .unwrap()
        .build()
        .unwrap()
}

#[test]
fn find_or_create_atom_deduplicates_by_data() {
    let conn = open_db_in_memory().unwrap();
    let catalog = SqliteCatalog::try_new(&conn).unwrap();

    let first = catalog
        .find_or_create_atom("Harbour", &types(&["title"]))
        .unwrap();
    let second = catalog
        .find_or_create_atom("Harbour", &types(&["title"]))
        .unwrap();
    let third = catalog
        .find_or_create_atom("Harbour", &types(&["name"]))
        .unwrap();

    assert!(first > 0);
    assert_eq!(first, second);
    assert_eq!(first, third);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM atoms WHERE data = 'Harbour';"), 1);
    assert_eq!(
        catalog.types_for_atom(first).unwrap(),
        types(&["title"]),
        "existing atom keeps its types"
    );
}

#[test]
fn tags_and_types_are_created_once() {
    let conn = open_db_in_memory().unwrap();
    let catalog = SqliteCatalog::try_new(&conn).unwrap();

    let ids: Vec<i64> = (0..5)
        .map(|_| catalog.find_or_create_tag("x").unwrap())
        .collect();
    assert!(ids.iter().all(|id| *id == ids[0]));
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM tags WHERE tag = 'x';"), 1);

    let type_id = catalog.find_or_create_type("title").unwrap();
    assert_eq!(catalog.find_or_create_type(" title ").unwrap(), type_id);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM types;"), 1);

    let err = catalog.find_or_create_tag("  ").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test]
fn lookups_of_missing_ids_are_not_errors() {
    let conn = open_db_in_memory().unwrap();
    let catalog = SqliteCatalog::try_new(&conn).unwrap();

    assert!(catalog.find_atom(404).unwrap().is_none());
    assert!(catalog.find_molecule(404).unwrap().is_none());
    assert!(catalog.find_atom_by_data("nothing").unwrap().is_none());
}

#[test]
fn create_molecule_persists_links_and_reuses_atoms() {
    let conn = open_db_in_memory().unwrap();
    let catalog = SqliteCatalog::try_new(&conn).unwrap();

    let first = catalog
        .create_molecule(
            &Molecule::builder()
                .with_atom(atom("Harbour", "title"))
                .unwrap()
                .with_atom(atom("Anna", "name"))
                .unwrap()
                .with_tags(["photo", "2019"])
                .unwrap()
                .build()
                .unwrap(),
        )
        .unwrap();
    let second = catalog
        .create_molecule(
            &Molecule::builder()
                .with_atom(atom("Anna", "name"))
                .unwrap()
                .with_tag("photo")
                .unwrap()
                .build()
                .unwrap(),
        )
        .unwrap();

    assert!(first.is_persistent());
    assert_eq!(first.tags(), ["photo".to_string(), "2019".to_string()]);
    assert_eq!(first.atoms()[0].data(), "Harbour");
    assert_eq!(first.atoms()[1].data(), "Anna");
    assert_eq!(second.atoms()[0].id(), first.atoms()[1].id());
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM atoms;"), 2);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM tags;"), 2);

    let reloaded = catalog.find_molecule(first.id()).unwrap().unwrap();
    assert_eq!(reloaded.atom_ids(), first.atom_ids());
    assert_eq!(catalog.count_molecules().unwrap(), 2);
}

#[test]
fn atom_data_is_matched_verbatim() {
    let conn = open_db_in_memory().unwrap();
    let catalog = SqliteCatalog::try_new(&conn).unwrap();

    let plain = catalog
        .find_or_create_atom("Harbour", &types(&["title"]))
        .unwrap();
    let padded = catalog
        .find_or_create_atom(" Harbour", &types(&["title"]))
        .unwrap();

    assert_ne!(plain, padded);
    assert_eq!(
        catalog.find_atom(padded).unwrap().unwrap().data(),
        " Harbour"
    );
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM types;"), 1);
}

#[test]
fn failed_type_link_rolls_back_the_new_atom() {
    let conn = open_db_in_memory().unwrap();
    let catalog = SqliteCatalog::try_new(&conn).unwrap();

    let err = catalog
        .find_or_create_atom("Harbour", &types(&["title", "  "]))
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM atoms;"), 0);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM atom_has_types;"), 0);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM types;"), 0);
    assert!(catalog.find_atom_by_data("Harbour").unwrap().is_none());
}

#[test]
fn failed_later_atom_rolls_back_earlier_inserts() {
    let conn = open_db_in_memory().unwrap();
    let catalog = SqliteCatalog::try_new(&conn).unwrap();

    let ghost = Atom::builder()
        .with_id(9999)
        .unwrap()
        .with_data("ghost")
        .unwrap()
        .with_type("title")
        .unwrap()
        .build()
        .unwrap();
    let molecule = Molecule::builder()
        .with_atom(atom("Fresh harbour", "title"))
        .unwrap()
        .with_atom(ghost)
        .unwrap()
        .with_tag("travel")
        .unwrap()
        .build()
        .unwrap();

    let err = catalog.create_molecule(&molecule).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM atoms;"), 0);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM atom_has_types;"), 0);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM types;"), 0);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM molecules;"), 0);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM molecule_has_atoms;"), 0);
}

#[test]
fn create_molecule_rejects_persisted_input_and_missing_atoms() {
    let conn = open_db_in_memory().unwrap();
    let catalog = SqliteCatalog::try_new(&conn).unwrap();

    let persisted = catalog
        .create_molecule(
            &Molecule::builder()
                .with_atom(atom("a", "title"))
                .unwrap()
                .with_tag("t")
                .unwrap()
                .build()
                .unwrap(),
        )
        .unwrap();
    let err = catalog.create_molecule(&persisted).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    let ghost = Atom::builder()
        .with_id(999)
        .unwrap()
        .with_data("ghost")
        .unwrap()
        .with_type("title")
        .unwrap()
        .build()
        .unwrap();
    let err = catalog
        .create_molecule(
            &Molecule::builder()
                .with_atom(ghost)
                .unwrap()
                .with_tag("orphan-tag")
                .unwrap()
                .build()
                .unwrap(),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM molecules;"), 1);
    assert_eq!(
        count(&conn, "SELECT COUNT(*) FROM tags WHERE tag = 'orphan-tag';"),
        0,
        "failed create leaves no partial rows"
    );
}

#[test]
fn find_atoms_by_type_include_and_exclude() {
    let conn = open_db_in_memory().unwrap();
    let catalog = SqliteCatalog::try_new(&conn).unwrap();

    let title = catalog
        .find_or_create_atom("Harbour", &types(&["title"]))
        .unwrap();
    let file = catalog
        .find_or_create_atom("ab/cd/ef", &types(&[FILEREF, FILETYPE_UNKNOWN]))
        .unwrap();
    let mixed = catalog
        .find_or_create_atom("mixed", &types(&["name", FILEREF]))
        .unwrap();

    let ids = |atoms: Vec<Atom>| atoms.iter().map(Atom::id).collect::<Vec<_>>();

    let included = catalog
        .find_atoms_by_type(&types(&[FILEREF]), TypeFilter::Include)
        .unwrap();
    assert_eq!(ids(included), vec![file, mixed]);

    let excluded = catalog
        .find_atoms_by_type(&types(&[FILEREF]), TypeFilter::Exclude)
        .unwrap();
    assert_eq!(ids(excluded), vec![title]);

    assert!(catalog
        .find_atoms_by_type(&[], TypeFilter::Include)
        .unwrap()
        .is_empty());
    assert_eq!(
        ids(catalog.find_atoms_by_type(&[], TypeFilter::Exclude).unwrap()),
        vec![title, file, mixed]
    );

    assert_eq!(ids(catalog.find_user_atoms().unwrap()), vec![title]);
    assert_eq!(catalog.user_domain().unwrap(), vec!["Harbour".to_string()]);
}

#[test]
fn find_molecules_by_tags_requires_every_tag() {
    let conn = open_db_in_memory().unwrap();
    let catalog = SqliteCatalog::try_new(&conn).unwrap();

    let build = |data: &str, tags: &[&str]| {
        catalog
            .create_molecule(
                &Molecule::builder()
                    .with_atom(atom(data, "title"))
                    .unwrap()
                    .with_tags(tags)
                    .unwrap()
                    .build()
                    .unwrap(),
            )
            .unwrap()
    };
    let both = build("one", &["photo", "family"]);
    let photo = build("two", &["photo"]);

    let ids = |molecules: Vec<Molecule>| molecules.iter().map(Molecule::id).collect::<Vec<_>>();
    assert_eq!(
        ids(catalog.find_molecules_by_tags(&types(&["photo"])).unwrap()),
        vec![both.id(), photo.id()]
    );
    assert_eq!(
        ids(catalog
            .find_molecules_by_tags(&types(&["photo", "family"]))
            .unwrap()),
        vec![both.id()]
    );
    assert_eq!(
        ids(catalog.find_molecules_by_tags(&[]).unwrap()),
        vec![both.id(), photo.id()]
    );
    assert_eq!(
        ids(catalog.find_molecules_by_atom_data("two").unwrap()),
        vec![photo.id()]
    );
    assert_eq!(
        catalog.list_tags().unwrap(),
        types(&["family", "photo"])
    );
    assert_eq!(catalog.tags_for_molecule(both.id()).unwrap(), types(&["photo", "family"]));
}
