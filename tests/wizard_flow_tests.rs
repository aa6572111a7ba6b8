//! Tests for the full installation wizard flow
//!
//! These drive the real install wizard, built against the full-screen
//! backend, with synthetic key events instead of a terminal. They verify:
//! - Visibility-driven navigation (sqlite skips the database server pages)
//! - Auto-population through on-show callbacks
//! - Back navigation over skipped pages
//! - Points of no return (the installing page)
//! - Step execution order and abort on failure

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tempfile::TempDir;

use rbsite::commands::install;
use rbsite::deps::Prober;
use rbsite::site::Site;
use rbsite::types::DbType;
use rbsite::ui::tui::StepStatus;
use rbsite::ui::{SiteRef, TuiWizard};

struct FakeProber;

impl Prober for FakeProber {
    fn is_available(&self, _provider: &str) -> bool {
        true
    }
}

fn key(ui: &mut TuiWizard, code: KeyCode) {
    ui.handle_key(KeyEvent::new(code, KeyModifiers::NONE));
}

fn type_str(ui: &mut TuiWizard, text: &str) {
    for c in text.chars() {
        key(ui, KeyCode::Char(c));
    }
}

/// Bundled media fixture matching what the directory step links in.
fn fixture_data_dir(root: &Path) -> PathBuf {
    let data = root.join("data");
    for dir in [
        "htdocs/errordocs",
        "htdocs/media/admin",
        "htdocs/media/rb",
        "htdocs/media/djblets",
    ] {
        fs::create_dir_all(data.join(dir)).unwrap();
    }
    data
}

/// A management interface stub that records its invocations and succeeds.
#[cfg(unix)]
fn stub_manage(root: &Path) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let log = root.join("manage.log");
    let script = root.join("manage");
    fs::write(
        &script,
        format!("#!/bin/sh\necho \"$@\" >> {}\nexit 0\n", log.display()),
    )
    .unwrap();
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
    script
}

/// A seeded site in a temp directory, as the dispatcher would build it with
/// default command-line options.
fn wizard_site(tmp: &TempDir) -> SiteRef {
    let mut site = Site::new(&tmp.path().join("reviews")).unwrap();
    site.bundled_data_dir = fixture_data_dir(tmp.path());
    site.copy_media = true;
    site.site_root = Some("/".to_string());
    site.media_url = Some("media/".to_string());
    site.db_name = Some("reviewboard".to_string());
    site.db_host = Some("localhost".to_string());
    site.admin_user = Some("admin".to_string());
    #[cfg(unix)]
    {
        site.manage_override = Some(stub_manage(tmp.path()));
    }
    Rc::new(RefCell::new(site))
}

/// Build the wizard and walk it to the database type page.
fn walk_to_database_type(ui: &mut TuiWizard, site: &SiteRef) {
    install::run(ui, site, &FakeProber, false).unwrap();
    ui.start();

    assert_eq!(
        ui.current_title(),
        Some("Welcome to the site installation wizard.")
    );

    key(ui, KeyCode::Enter);
    assert_eq!(ui.current_title(), Some("What's the domain name for this site?"));
    type_str(ui, "reviews.example.com");

    key(ui, KeyCode::Enter);
    assert_eq!(ui.current_title(), Some("What URL path points to the site?"));

    key(ui, KeyCode::Enter);
    assert_eq!(
        ui.current_title(),
        Some("What URL will point to the media files?")
    );

    key(ui, KeyCode::Enter);
    assert_eq!(
        ui.current_title(),
        Some("What database type will you be using?")
    );
}

#[test]
fn test_sqlite_hides_database_server_pages_and_computes_path() {
    let tmp = TempDir::new().unwrap();
    let site = wizard_site(&tmp);
    let mut ui = TuiWizard::new();

    walk_to_database_type(&mut ui, &site);

    // mysql, postgresql, sqlite3; move the selection to sqlite3.
    key(&mut ui, KeyCode::Down);
    key(&mut ui, KeyCode::Down);
    assert_eq!(site.borrow().db_type, Some(DbType::Sqlite3));

    key(&mut ui, KeyCode::Enter);
    assert_eq!(ui.current_title(), Some("Determining database file path."));

    // The on-show callback computed the database file path.
    let db_name = site.borrow().db_name.clone().unwrap();
    assert!(db_name.ends_with("db/reviewboard.db"), "got {db_name}");

    // The database server and login pages are skipped outright.
    key(&mut ui, KeyCode::Enter);
    assert_eq!(
        ui.current_title(),
        Some("What cache mechanism should be used?")
    );
    assert!(site.borrow().db_user.is_none());
    assert!(site.borrow().db_port.is_none());

    // Back returns to the last *shown* page, not to a skipped one.
    key(&mut ui, KeyCode::Esc);
    assert_eq!(ui.current_title(), Some("Determining database file path."));
}

#[test]
fn test_server_database_shows_host_and_login_pages() {
    let tmp = TempDir::new().unwrap();
    let site = wizard_site(&tmp);
    let mut ui = TuiWizard::new();

    walk_to_database_type(&mut ui, &site);

    // Keep the default selection (mysql).
    assert_eq!(site.borrow().db_type, Some(DbType::Mysql));

    key(&mut ui, KeyCode::Enter);
    assert_eq!(
        ui.current_title(),
        Some("What database name should the site use?")
    );

    key(&mut ui, KeyCode::Enter);
    assert_eq!(
        ui.current_title(),
        Some("What is the database server's address?")
    );

    // host:port splits through the live binding.
    type_str(&mut ui, ":5555");
    assert_eq!(site.borrow().db_host.as_deref(), Some("localhost"));
    assert_eq!(site.borrow().db_port.as_deref(), Some("5555"));
}

#[cfg(unix)]
#[test]
fn test_full_install_reaches_pipeline_and_finishes() {
    let tmp = TempDir::new().unwrap();
    let site = wizard_site(&tmp);
    let mut ui = TuiWizard::new();

    walk_to_database_type(&mut ui, &site);

    // sqlite3 keeps the flow short.
    key(&mut ui, KeyCode::Down);
    key(&mut ui, KeyCode::Down);
    key(&mut ui, KeyCode::Enter); // database file path page
    key(&mut ui, KeyCode::Enter); // cache type page
    assert_eq!(
        ui.current_title(),
        Some("What cache mechanism should be used?")
    );

    key(&mut ui, KeyCode::Enter); // memcached connection string page
    assert_eq!(
        ui.current_title(),
        Some("What memcached connection string should be used?")
    );
    assert_eq!(
        site.borrow().cache_info.as_deref(),
        Some("memcached://localhost:11211/")
    );

    key(&mut ui, KeyCode::Enter);
    assert_eq!(ui.current_title(), Some("What web server will you be using?"));
    key(&mut ui, KeyCode::Down); // lighttpd avoids the loader page
    key(&mut ui, KeyCode::Enter);

    assert_eq!(ui.current_title(), Some("Create an administrator account"));
    // Username is prefilled; fill in the password and address.
    key(&mut ui, KeyCode::Tab);
    type_str(&mut ui, "s3cret");
    key(&mut ui, KeyCode::Tab);
    type_str(&mut ui, "admin@example.com");

    key(&mut ui, KeyCode::Enter);
    assert_eq!(ui.current_title(), Some("Installing the site..."));

    // A point of no return: back is refused here.
    key(&mut ui, KeyCode::Esc);
    assert_eq!(ui.current_title(), Some("Installing the site..."));

    ui.run_due_steps();
    let states = ui.step_states();
    assert_eq!(states.len(), 6);
    assert!(states.iter().all(|(_, status)| *status == StepStatus::Done));

    // The pipeline ran against the stub management interface in order.
    let log = fs::read_to_string(tmp.path().join("manage.log")).unwrap();
    let commands: Vec<&str> = log
        .lines()
        .map(|line| line.split_whitespace().next().unwrap())
        .collect();
    assert_eq!(
        commands,
        vec![
            "syncdb",
            "registerscmtools",
            "evolve",
            "createadmin",
            "set-site-domain",
            "set-siteconfig",
            "set-siteconfig",
            "set-siteconfig",
            "set-siteconfig",
        ]
    );

    // And the finished page is reachable.
    key(&mut ui, KeyCode::Enter);
    assert_eq!(ui.current_title(), Some("The site has been installed"));

    let root = tmp.path().join("reviews");
    assert!(root.join("conf/lighttpd.conf").is_file());
    assert!(root.join("conf/settings_local.json").is_file());
    assert!(root.join("db").is_dir());
}

#[cfg(unix)]
#[test]
fn test_failing_step_skips_the_rest_and_hides_finished_page() {
    let tmp = TempDir::new().unwrap();
    let site = wizard_site(&tmp);
    // No management interface: the database step will fail.
    site.borrow_mut().manage_override = Some(tmp.path().join("missing-manage"));

    let mut ui = TuiWizard::new();
    walk_to_database_type(&mut ui, &site);

    key(&mut ui, KeyCode::Down);
    key(&mut ui, KeyCode::Down); // sqlite3
    key(&mut ui, KeyCode::Enter); // database file path
    key(&mut ui, KeyCode::Enter); // cache type
    key(&mut ui, KeyCode::Enter); // memcached info
    key(&mut ui, KeyCode::Enter); // web server
    key(&mut ui, KeyCode::Down); // lighttpd
    key(&mut ui, KeyCode::Enter); // admin account
    key(&mut ui, KeyCode::Tab);
    type_str(&mut ui, "s3cret");
    key(&mut ui, KeyCode::Tab);
    type_str(&mut ui, "admin@example.com");
    key(&mut ui, KeyCode::Enter);

    assert_eq!(ui.current_title(), Some("Installing the site..."));
    ui.run_due_steps();

    let states = ui.step_states();
    assert_eq!(states[0].1, StepStatus::Done); // directories
    assert_eq!(states[1].1, StepStatus::Done); // configuration
    assert_eq!(states[2].1, StepStatus::Failed); // database
    assert_eq!(states[3].1, StepStatus::Skipped);
    assert_eq!(states[4].1, StepStatus::Skipped);
    assert_eq!(states[5].1, StepStatus::Skipped);

    // Earlier effects stay; nothing is rolled back.
    assert!(tmp.path().join("reviews/conf/settings_local.json").is_file());

    // The finished page is not offered after a failure.
    assert!(!ui.has_next());
}

#[test]
fn test_fatal_missing_dependencies_stop_the_wizard() {
    struct NothingProber;

    impl Prober for NothingProber {
        fn is_available(&self, _provider: &str) -> bool {
            false
        }
    }

    let tmp = TempDir::new().unwrap();
    let site = wizard_site(&tmp);
    let mut ui = TuiWizard::new();

    let result = install::run(&mut ui, &site, &NothingProber, false);
    assert!(result.is_err());

    // Only the introduction and the missing-dependencies page exist.
    ui.start();
    assert_eq!(
        ui.current_title(),
        Some("Welcome to the site installation wizard.")
    );
    ui.advance_page();
    assert_eq!(ui.current_title(), Some("Required dependencies are missing."));
    assert!(!ui.has_next());
}
