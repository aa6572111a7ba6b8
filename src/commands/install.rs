//! The 'install' command
//!
//! Defines the installation wizard against whichever presentation backend is
//! active, then the provisioning step pipeline. Pages carry visibility
//! predicates reading the shared site model, so answers on earlier pages
//! decide which later pages exist at all: picking sqlite3 computes the
//! database path and removes the server and login pages from the flow.
//!
//! With `--noinput` the wizard pages are skipped entirely and the pipeline
//! runs straight off the command-line values; a value a step needs but never
//! got surfaces as that step's failure, not earlier.

use std::cell::Cell;
use std::rc::Rc;
use std::str::FromStr;

use tracing::info;

use crate::cli::InstallArgs;
use crate::deps::{self, Prober};
use crate::error::{Result, SiteError};
use crate::normalize;
use crate::types::{CacheType, DbType, PythonLoader, WebServerType};
use crate::ui::{Choice, InputSpec, PageOptions, SiteRef, StepFn, UiToolkit};

const DOCS_BASE: &str = "https://www.reviewboard.org/docs/manual/dev/";

/// Apply command-line values to the site model. In interactive mode these
/// become the prompt defaults; with `--noinput` they are all the input there
/// is.
pub fn seed_site(site: &SiteRef, args: &InstallArgs) -> Result<()> {
    let mut site = site.borrow_mut();

    site.copy_media = args.copy_media;
    site.domain_name = args.domain_name.clone();
    site.site_root = Some(args.site_root.clone());
    site.media_url = Some(args.media_url.clone());
    site.db_type = parse_opt::<DbType>(&args.db_type, "database type")?;
    site.db_name = Some(args.db_name.clone());
    site.db_host = Some(args.db_host.clone());
    site.db_user = args.db_user.clone();
    site.db_pass = args.db_pass.clone();
    site.cache_type = parse_opt::<CacheType>(&args.cache_type, "cache type")?;
    site.cache_info = args.cache_info.clone();
    site.web_server_type = parse_opt::<WebServerType>(&args.web_server_type, "web server type")?;
    site.python_loader = parse_opt::<PythonLoader>(&args.python_loader, "python loader")?;
    site.admin_user = Some(args.admin_user.clone());
    site.admin_password = args.admin_password.clone();
    site.admin_email = args.admin_email.clone();

    Ok(())
}

fn parse_opt<T: FromStr>(value: &Option<String>, what: &str) -> Result<Option<T>> {
    match value {
        Some(raw) => T::from_str(raw)
            .map(Some)
            .map_err(|_| SiteError::validation(format!("'{raw}' is not a valid {what}"))),
        None => Ok(None),
    }
}

/// Drive the installation: pre-flight checks, dependency probe, wizard pages
/// (unless non-interactive) and finally the step pipeline.
pub fn run(
    ui: &mut dyn UiToolkit,
    site: &SiteRef,
    prober: &dyn Prober,
    noinput: bool,
) -> Result<()> {
    check_permissions(ui, site)?;

    print_introduction(ui, site)?;

    if print_missing_dependencies(ui, prober)? {
        // Required dependencies are missing. Don't show any more pages.
        return Err(SiteError::dependency(
            "no supported database is available on this host",
        ));
    }

    if !noinput {
        ask_domain(ui, site)?;
        ask_site_root(ui, site)?;
        ask_media_url(ui, site)?;
        ask_database_type(ui, site, prober)?;
        ask_database_name(ui, site)?;
        ask_database_host(ui, site)?;
        ask_database_login(ui, site)?;
        ask_cache_type(ui, site, prober)?;
        ask_cache_info(ui, site)?;
        ask_web_server_type(ui, site)?;
        ask_python_loader(ui, site)?;
        ask_admin_user(ui, site)?;
    } else {
        info!("running non-interactively from command-line options");
    }

    let failed = Rc::new(Cell::new(false));
    show_install_status(ui, site, &failed)?;
    show_finished(ui, site, &failed)?;

    Ok(())
}

/// Fail fast on permission problems before any page is shown, by creating
/// and immediately removing the install directory.
fn check_permissions(ui: &mut dyn UiToolkit, site: &SiteRef) -> Result<()> {
    let install_dir = site.borrow().install_dir.clone();

    let created = std::fs::create_dir(&install_dir).and_then(|()| std::fs::remove_dir(&install_dir));

    match created {
        Ok(()) => Ok(()),
        Err(_) => {
            let message = format!(
                "Unable to create the {} directory. Make sure you're running \
                 as an administrator.",
                install_dir.display()
            );
            ui.error(&message)?;
            Err(SiteError::preflight(message))
        }
    }
}

fn print_introduction(ui: &mut dyn UiToolkit, site: &SiteRef) -> Result<()> {
    let page = ui.page(
        "Welcome to the site installation wizard.",
        PageOptions::default(),
    )?;

    ui.text(page, "This will prepare a site installation in:")?;
    ui.text(page, &site.borrow().abs_install_dir.display().to_string())?;
    ui.text(
        page,
        "We need to know a few things before we can prepare your site for \
         installation. This will only take a few minutes.",
    )?;

    Ok(())
}

/// Show whatever the dependency probe found missing. Returns true when a
/// required group is entirely absent, which blocks the installation.
fn print_missing_dependencies(ui: &mut dyn UiToolkit, prober: &dyn Prober) -> Result<bool> {
    let (fatal, missing_groups) = deps::probe_missing(&deps::INSTALL_GROUPS, prober);

    if !missing_groups.is_empty() {
        let page = if fatal {
            let page = ui.page("Required dependencies are missing.", PageOptions::default())?;
            ui.text(
                page,
                "You are missing dependencies that are needed before the \
                 installation process. You will need to install the \
                 necessary software and restart the install.",
            )?;
            page
        } else {
            let page = ui.page(
                "Make sure you have the dependencies you need.",
                PageOptions::default(),
            )?;
            ui.text(
                page,
                "Depending on your installation, you may need certain \
                 servers and tools that are missing.",
            )?;
            ui.text(
                page,
                "If you need support for any of the following, you will \
                 need to install the necessary software and restart the \
                 install.",
            )?;
            page
        };

        for group in &missing_groups {
            ui.itemized_list(page, &group.title, &group.missing)?;
        }
    }

    Ok(fatal)
}

fn ask_domain(ui: &mut dyn UiToolkit, site: &SiteRef) -> Result<()> {
    let page = ui.page("What's the domain name for this site?", PageOptions::default())?;

    ui.text(
        page,
        "This should be the full domain without the http://, port or path.",
    )?;

    let default = site.borrow().domain_name.clone();
    let target = Rc::clone(site);
    ui.prompt_input(
        page,
        "Domain Name",
        InputSpec::new(Box::new(move |value| {
            target.borrow_mut().domain_name = Some(value.to_string());
        }))
        .with_default(default),
    )
}

fn ask_site_root(ui: &mut dyn UiToolkit, site: &SiteRef) -> Result<()> {
    let page = ui.page("What URL path points to the site?", PageOptions::default())?;

    ui.text(
        page,
        "Typically, the site exists at the root of a URL. For example, \
         http://reviews.example.com/. In this case, you would specify \"/\".",
    )?;
    ui.text(
        page,
        "However, if you want to listen to, say, http://example.com/reviews/, \
         you can specify \"/reviews/\".",
    )?;
    ui.text(
        page,
        "Note that this is the path relative to the domain and should not \
         include the domain name.",
    )?;

    let default = site.borrow().site_root.clone();
    let target = Rc::clone(site);
    ui.prompt_input(
        page,
        "Root Path",
        InputSpec::new(Box::new(move |value| {
            target.borrow_mut().site_root = Some(value.to_string());
        }))
        .with_default(default)
        .with_normalize(Box::new(|value| normalize::root_url_path(value))),
    )
}

fn ask_media_url(ui: &mut dyn UiToolkit, site: &SiteRef) -> Result<()> {
    let page = ui.page(
        "What URL will point to the media files?",
        PageOptions::default(),
    )?;

    ui.text(
        page,
        "While most installations distribute media files on the same server \
         as the rest of the site, some custom installs may instead have a \
         separate server for this purpose.",
    )?;

    let default = site.borrow().media_url.clone();
    let target = Rc::clone(site);
    ui.prompt_input(
        page,
        "Media URL",
        InputSpec::new(Box::new(move |value| {
            target.borrow_mut().media_url = Some(value.to_string());
        }))
        .with_default(default)
        .with_normalize(Box::new(|value| normalize::media_url_path(value))),
    )
}

fn ask_database_type(ui: &mut dyn UiToolkit, site: &SiteRef, prober: &dyn Prober) -> Result<()> {
    let page = ui.page(
        "What database type will you be using?",
        PageOptions::default(),
    )?;

    let target = Rc::clone(site);
    ui.prompt_choice(
        page,
        "Database Type",
        vec![
            Choice::new(DbType::Mysql.to_string(), deps::support_mysql(prober)),
            Choice::new(
                DbType::Postgresql.to_string(),
                deps::support_postgresql(prober),
            ),
            Choice::new(DbType::Sqlite3.to_string(), deps::support_sqlite(prober)),
        ],
        Box::new(move |label| {
            if let Ok(db_type) = label.parse::<DbType>() {
                target.borrow_mut().db_type = Some(db_type);
            }
        }),
    )
}

fn ask_database_name(ui: &mut dyn UiToolkit, site: &SiteRef) -> Result<()> {
    let sqlite_db_path = site
        .borrow()
        .abs_install_dir
        .join("db")
        .join("reviewboard.db");

    // Appears only if using sqlite.
    let visible = Rc::clone(site);
    let on_show = Rc::clone(site);
    let computed_path = sqlite_db_path.display().to_string();
    let stored_path = computed_path.clone();
    let page = ui.page(
        "Determining database file path.",
        PageOptions {
            visible: Some(Box::new(move || {
                visible.borrow().db_type == Some(DbType::Sqlite3)
            })),
            on_show: Some(Box::new(move || {
                on_show.borrow_mut().db_name = Some(stored_path.clone());
            })),
            ..Default::default()
        },
    )?;

    ui.text(
        page,
        &format!("The sqlite database file will be stored in {computed_path}"),
    )?;
    ui.text(
        page,
        "If you are migrating from an existing installation, you can move \
         your existing database there, or edit the site settings to point to \
         your old location.",
    )?;

    // Appears only if not using sqlite.
    let visible = Rc::clone(site);
    let page = ui.page(
        "What database name should the site use?",
        PageOptions {
            visible: Some(Box::new(move || {
                visible.borrow().db_type != Some(DbType::Sqlite3)
            })),
            ..Default::default()
        },
    )?;

    ui.text(
        page,
        "You may need to create this database and grant a user modification \
         rights before continuing.",
    )?;

    let default = site.borrow().db_name.clone();
    let target = Rc::clone(site);
    ui.prompt_input(
        page,
        "Database Name",
        InputSpec::new(Box::new(move |value| {
            target.borrow_mut().db_name = Some(value.to_string());
        }))
        .with_default(default),
    )
}

fn ask_database_host(ui: &mut dyn UiToolkit, site: &SiteRef) -> Result<()> {
    let visible = Rc::clone(site);
    let page = ui.page(
        "What is the database server's address?",
        PageOptions {
            visible: Some(Box::new(move || {
                visible.borrow().db_type != Some(DbType::Sqlite3)
            })),
            ..Default::default()
        },
    )?;

    ui.text(
        page,
        "This should be specified in hostname:port form. The port is \
         optional if you're using a standard port for the database type.",
    )?;

    let default = site.borrow().db_host.clone();
    let target = Rc::clone(site);
    let port_target = Rc::clone(site);
    ui.prompt_input(
        page,
        "Database Server",
        InputSpec::new(Box::new(move |value| {
            target.borrow_mut().db_host = Some(value.to_string());
        }))
        .with_default(default)
        .with_normalize(Box::new(move |value| {
            let (host, port) = normalize::split_host_port(value);
            if let Some(port) = port {
                port_target.borrow_mut().db_port = Some(port);
            }
            host
        })),
    )
}

fn ask_database_login(ui: &mut dyn UiToolkit, site: &SiteRef) -> Result<()> {
    let visible = Rc::clone(site);
    let page = ui.page(
        "What is the login and password for this database?",
        PageOptions {
            visible: Some(Box::new(move || {
                visible.borrow().db_type != Some(DbType::Sqlite3)
            })),
            ..Default::default()
        },
    )?;

    ui.text(
        page,
        "This must be a user that has creation and modification rights on \
         the database.",
    )?;

    let default = site.borrow().db_user.clone();
    let target = Rc::clone(site);
    ui.prompt_input(
        page,
        "Database Username",
        InputSpec::new(Box::new(move |value| {
            target.borrow_mut().db_user = Some(value.to_string());
        }))
        .with_default(default),
    )?;

    let default = site.borrow().db_pass.clone();
    let target = Rc::clone(site);
    ui.prompt_input(
        page,
        "Database Password",
        InputSpec::new(Box::new(move |value| {
            target.borrow_mut().db_pass = Some(value.to_string());
        }))
        .with_default(default)
        .masked(),
    )
}

fn ask_cache_type(ui: &mut dyn UiToolkit, site: &SiteRef, prober: &dyn Prober) -> Result<()> {
    let page = ui.page("What cache mechanism should be used?", PageOptions::default())?;

    ui.text(
        page,
        "memcached is strongly recommended. Use it unless you have a good \
         reason not to.",
    )?;

    let target = Rc::clone(site);
    ui.prompt_choice(
        page,
        "Cache Type",
        vec![
            Choice::new(
                CacheType::Memcached.to_string(),
                deps::support_memcached(prober),
            ),
            Choice::new(CacheType::File.to_string(), true),
        ],
        Box::new(move |label| {
            if let Ok(cache_type) = label.parse::<CacheType>() {
                target.borrow_mut().cache_type = Some(cache_type);
            }
        }),
    )
}

fn ask_cache_info(ui: &mut dyn UiToolkit, site: &SiteRef) -> Result<()> {
    // Appears only if using memcached.
    let visible = Rc::clone(site);
    let page = ui.page(
        "What memcached connection string should be used?",
        PageOptions {
            visible: Some(Box::new(move || {
                visible.borrow().cache_type == Some(CacheType::Memcached)
            })),
            ..Default::default()
        },
    )?;

    ui.text(
        page,
        "This is generally in the format of memcached://hostname:port/",
    )?;

    let default = site
        .borrow()
        .cache_info
        .clone()
        .or_else(|| Some("memcached://localhost:11211/".to_string()));
    let target = Rc::clone(site);
    ui.prompt_input(
        page,
        "Memcache Server",
        InputSpec::new(Box::new(move |value| {
            target.borrow_mut().cache_info = Some(value.to_string());
        }))
        .with_default(default),
    )?;

    // Appears only if using file caching.
    let visible = Rc::clone(site);
    let page = ui.page(
        "Where should the temporary cache files be stored?",
        PageOptions {
            visible: Some(Box::new(move || {
                visible.borrow().cache_type == Some(CacheType::File)
            })),
            ..Default::default()
        },
    )?;

    let default = site
        .borrow()
        .cache_info
        .clone()
        .or_else(|| Some("/tmp/reviewboard_cache".to_string()));
    let target = Rc::clone(site);
    ui.prompt_input(
        page,
        "Cache Directory",
        InputSpec::new(Box::new(move |value| {
            target.borrow_mut().cache_info = Some(value.to_string());
        }))
        .with_default(default)
        .with_normalize(Box::new(|value| normalize::file_cache_info(value))),
    )
}

fn ask_web_server_type(ui: &mut dyn UiToolkit, site: &SiteRef) -> Result<()> {
    let page = ui.page("What web server will you be using?", PageOptions::default())?;

    let target = Rc::clone(site);
    ui.prompt_choice(
        page,
        "Web Server",
        vec![
            Choice::new(WebServerType::Apache.to_string(), true),
            Choice::new(WebServerType::Lighttpd.to_string(), true),
        ],
        Box::new(move |label| {
            if let Ok(server) = label.parse::<WebServerType>() {
                target.borrow_mut().web_server_type = Some(server);
            }
        }),
    )
}

fn ask_python_loader(ui: &mut dyn UiToolkit, site: &SiteRef) -> Result<()> {
    let visible = Rc::clone(site);
    let page = ui.page(
        "What Python loader module will you be using?",
        PageOptions {
            visible: Some(Box::new(move || {
                visible.borrow().web_server_type == Some(WebServerType::Apache)
            })),
            ..Default::default()
        },
    )?;

    ui.text(
        page,
        "Based on our experiences, we recommend using modpython with this \
         site.",
    )?;

    let target = Rc::clone(site);
    ui.prompt_choice(
        page,
        "Python Loader",
        vec![
            Choice::new(PythonLoader::Modpython.to_string(), true),
            Choice::new(PythonLoader::Fastcgi.to_string(), true),
        ],
        Box::new(move |label| {
            if let Ok(loader) = label.parse::<PythonLoader>() {
                target.borrow_mut().python_loader = Some(loader);
            }
        }),
    )
}

fn ask_admin_user(ui: &mut dyn UiToolkit, site: &SiteRef) -> Result<()> {
    let page = ui.page("Create an administrator account", PageOptions::default())?;

    ui.text(
        page,
        "To configure the site, you'll need an administrator account. It is \
         advised to have one administrator and then use that account to \
         grant administrator permissions to your personal user account.",
    )?;
    ui.text(
        page,
        "If you plan to use NIS or LDAP, use an account name other than \
         your NIS/LDAP account so as to prevent conflicts.",
    )?;

    let default = site.borrow().admin_user.clone();
    let target = Rc::clone(site);
    ui.prompt_input(
        page,
        "Username",
        InputSpec::new(Box::new(move |value| {
            target.borrow_mut().admin_user = Some(value.to_string());
        }))
        .with_default(default),
    )?;

    let default = site.borrow().admin_password.clone();
    let target = Rc::clone(site);
    ui.prompt_input(
        page,
        "Password",
        InputSpec::new(Box::new(move |value| {
            target.borrow_mut().admin_password = Some(value.to_string());
        }))
        .with_default(default)
        .masked(),
    )?;

    let default = site.borrow().admin_email.clone();
    let target = Rc::clone(site);
    ui.prompt_input(
        page,
        "E-Mail Address",
        InputSpec::new(Box::new(move |value| {
            target.borrow_mut().admin_email = Some(value.to_string());
        }))
        .with_default(default),
    )
}

/// The provisioning pipeline. Strictly ordered; the backend abandons the
/// remaining steps after the first failure, and the shared flag keeps the
/// finished page from appearing over a failed install.
fn show_install_status(
    ui: &mut dyn UiToolkit,
    site: &SiteRef,
    failed: &Rc<Cell<bool>>,
) -> Result<()> {
    let page = ui.page(
        "Installing the site...",
        PageOptions {
            allow_back: false,
            ..Default::default()
        },
    )?;

    let target = Rc::clone(site);
    ui.step(
        page,
        "Building site directories",
        guarded(failed, move || target.borrow().rebuild_site_directory()),
    )?;

    let target = Rc::clone(site);
    ui.step(
        page,
        "Building site configuration files",
        guarded(failed, move || target.borrow().generate_config_files()),
    )?;

    let target = Rc::clone(site);
    ui.step(
        page,
        "Creating database",
        guarded(failed, move || target.borrow().sync_database()),
    )?;

    let target = Rc::clone(site);
    ui.step(
        page,
        "Performing migrations",
        guarded(failed, move || target.borrow().migrate_database()),
    )?;

    let target = Rc::clone(site);
    ui.step(
        page,
        "Creating administrator account",
        guarded(failed, move || target.borrow().create_admin_user()),
    )?;

    let target = Rc::clone(site);
    ui.step(
        page,
        "Saving site settings",
        guarded(failed, move || target.borrow().save_settings()),
    )?;

    Ok(())
}

fn guarded(failed: &Rc<Cell<bool>>, mut action: impl FnMut() -> Result<()> + 'static) -> StepFn {
    let failed = Rc::clone(failed);
    Box::new(move || {
        let result = action();
        if result.is_err() {
            failed.set(true);
        }
        result
    })
}

fn show_finished(ui: &mut dyn UiToolkit, site: &SiteRef, failed: &Rc<Cell<bool>>) -> Result<()> {
    let failed = Rc::clone(failed);
    let page = ui.page(
        "The site has been installed",
        PageOptions {
            allow_back: false,
            visible: Some(Box::new(move || !failed.get())),
            ..Default::default()
        },
    )?;

    ui.text(
        page,
        &format!(
            "The site has been installed in {}",
            site.borrow().install_dir.display()
        ),
    )?;
    ui.text(
        page,
        "Sample configuration files for web servers and cron are available \
         in the conf/ directory.",
    )?;
    ui.text(
        page,
        "You need to modify the ownership of the \"htdocs/media/uploaded\" \
         directory and all of its contents to be owned by the web server.",
    )?;
    ui.text(
        page,
        "If using SQLite, you will also need to modify the ownership of the \
         \"db\" directory and its contents.",
    )?;
    ui.text(page, "For more information, visit:")?;
    ui.url_link(page, &format!("{DOCS_BASE}admin/sites/creating-sites/"))?;

    Ok(())
}
