//! Certkit CLI - manage certificate templates and render them to draw
//! command streams.
//!
//! This is the command-line interface for certkit. It provides a
//! user-friendly surface over the core library functionality.

mod config;

use std::path::Path;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use uuid::Uuid;

use certkit_core::render::OutputMode;
use certkit_core::store::types::{PageMetricsUpdate, PageRecord};
use certkit_core::store::TemplateStore;
use certkit_core::{
    ElementFactory, MoveDirection, MoveKind, RecordingCanvas, RenderOptions, SqliteStore, Subject,
    Template, VERSION,
};

/// Certkit - certificate template management and rendering
#[derive(Parser)]
#[command(name = "certkit")]
#[command(author, version = VERSION, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to the template store
    #[arg(short, long, global = true, env = "CERTKIT_STORE")]
    store: Option<String>,

    #[command(subcommand)]
    command: Commands,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new template store
    Init {
        /// Path where the store will be created
        #[arg(value_name = "PATH")]
        path: Option<String>,
    },

    /// Manage templates
    #[command(subcommand)]
    Template(TemplateCommands),

    /// Manage template pages
    #[command(subcommand)]
    Page(PageCommands),

    /// Manage page elements
    #[command(subcommand)]
    Element(ElementCommands),

    /// Render a template to a draw command stream
    Render {
        /// Template ID
        #[arg(value_name = "TEMPLATE")]
        template: String,

        /// Render with placeholder data
        #[arg(long)]
        preview: bool,

        /// Recipient full name
        #[arg(long)]
        name: Option<String>,

        /// Course title
        #[arg(long)]
        course: Option<String>,

        /// Award date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<String>,

        /// Write the output to a file instead of stdout
        #[arg(long, value_name = "PATH")]
        out: Option<String>,
    },

    /// Check store sequence integrity
    Check,
}

#[derive(Subcommand)]
enum TemplateCommands {
    /// Create a new template
    Create {
        /// Template name
        #[arg(value_name = "NAME")]
        name: String,

        /// Owning context reference
        #[arg(long, default_value_t = 1)]
        context: i64,
    },

    /// List all templates
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show a template and its structure
    Show {
        /// Template ID
        #[arg(value_name = "ID")]
        id: String,
    },

    /// Rename a template
    Rename {
        /// Template ID
        #[arg(value_name = "ID")]
        id: String,

        /// New name
        #[arg(value_name = "NAME")]
        name: String,
    },

    /// Delete a template and everything it owns
    Delete {
        /// Template ID
        #[arg(value_name = "ID")]
        id: String,
    },

    /// Copy a template's pages and elements into another template
    Copy {
        /// Source template ID
        #[arg(value_name = "SOURCE")]
        source: String,

        /// Target template ID
        #[arg(value_name = "TARGET")]
        target: String,
    },
}

#[derive(Subcommand)]
enum PageCommands {
    /// Append a page to a template
    Add {
        /// Template ID
        #[arg(value_name = "TEMPLATE")]
        template: String,
    },

    /// Delete a page and its elements
    Delete {
        /// Template ID
        #[arg(value_name = "TEMPLATE")]
        template: String,

        /// Page ID
        #[arg(value_name = "PAGE")]
        page: String,
    },

    /// Move a page up or down within its template
    Move {
        /// Template ID
        #[arg(value_name = "TEMPLATE")]
        template: String,

        /// Page ID
        #[arg(value_name = "PAGE")]
        page: String,

        /// Direction (up, down)
        #[arg(value_name = "DIRECTION")]
        direction: String,
    },

    /// Update a page's layout metrics
    SetSize {
        /// Template ID
        #[arg(value_name = "TEMPLATE")]
        template: String,

        /// Page ID
        #[arg(value_name = "PAGE")]
        page: String,

        /// Page width in millimetres
        #[arg(long)]
        width: Option<f64>,

        /// Page height in millimetres
        #[arg(long)]
        height: Option<f64>,

        /// Left margin in millimetres
        #[arg(long)]
        left_margin: Option<f64>,

        /// Right margin in millimetres
        #[arg(long)]
        right_margin: Option<f64>,
    },
}

#[derive(Subcommand)]
enum ElementCommands {
    /// Append an element to a page
    Add {
        /// Template ID
        #[arg(value_name = "TEMPLATE")]
        template: String,

        /// Page ID
        #[arg(value_name = "PAGE")]
        page: String,

        /// Element type (text, image, line, date)
        #[arg(value_name = "TYPE")]
        element_type: String,

        /// Element payload as JSON
        #[arg(long, value_name = "JSON")]
        data: String,
    },

    /// Replace an element's payload
    Edit {
        /// Template ID
        #[arg(value_name = "TEMPLATE")]
        template: String,

        /// Element ID
        #[arg(value_name = "ELEMENT")]
        element: String,

        /// Replacement payload as JSON
        #[arg(long, value_name = "JSON")]
        data: String,
    },

    /// List the elements of a page
    List {
        /// Page ID
        #[arg(value_name = "PAGE")]
        page: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete an element
    Delete {
        /// Template ID
        #[arg(value_name = "TEMPLATE")]
        template: String,

        /// Element ID
        #[arg(value_name = "ELEMENT")]
        element: String,
    },

    /// Move an element up or down within its page
    Move {
        /// Template ID
        #[arg(value_name = "TEMPLATE")]
        template: String,

        /// Element ID
        #[arg(value_name = "ELEMENT")]
        element: String,

        /// Direction (up, down)
        #[arg(value_name = "DIRECTION")]
        direction: String,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Init { path } => {
            let target = match path {
                Some(value) => std::path::PathBuf::from(value),
                None => config::resolve_store_path(cli.store.as_deref())?,
            };
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            SqliteStore::create(&target)?;

            let config_path = config::default_config_path()?;
            if !config_path.exists() {
                config::write_config(&config_path, &config::CertkitConfig::new(target.clone()))?;
            }

            if !cli.quiet {
                println!("Initialized new template store at {}", target.display());
            }
        }
        Commands::Template(command) => {
            let mut store = open_store(cli.store.as_deref())?;
            run_template_command(&mut store, command, cli.quiet)?;
        }
        Commands::Page(command) => {
            let mut store = open_store(cli.store.as_deref())?;
            run_page_command(&mut store, command, cli.quiet)?;
        }
        Commands::Element(command) => {
            let mut store = open_store(cli.store.as_deref())?;
            run_element_command(&mut store, command, cli.quiet)?;
        }
        Commands::Render {
            template,
            preview,
            name,
            course,
            date,
            out,
        } => {
            let store = open_store(cli.store.as_deref())?;
            let factory = ElementFactory::with_builtins();
            let template = Template::load(&store, parse_uuid(&template)?)?;

            let options = build_render_options(preview, name, course, date, out.is_some())?;

            match out {
                Some(path) => {
                    let file = std::fs::File::create(Path::new(&path))?;
                    let mut canvas = RecordingCanvas::with_writer(Box::new(file));
                    template.render(&store, &factory, &mut canvas, &options)?;
                    if !cli.quiet {
                        println!("Rendered template to {}", path);
                    }
                }
                None => {
                    let mut canvas = RecordingCanvas::new();
                    let bytes = template
                        .render(&store, &factory, &mut canvas, &options)?
                        .ok_or_else(|| anyhow::anyhow!("Render produced no output"))?;
                    println!("{}", String::from_utf8_lossy(&bytes));
                }
            }
        }
        Commands::Check => {
            let store = open_store(cli.store.as_deref())?;
            match store.check_integrity() {
                Ok(()) => {
                    if !cli.quiet {
                        println!("Integrity check: OK");
                    }
                }
                Err(err) => {
                    eprintln!("Integrity check: FAILED");
                    eprintln!("- error: {}", err);
                    return Err(anyhow::anyhow!("Integrity check failed"));
                }
            }
        }
    }

    Ok(())
}

fn open_store(flag: Option<&str>) -> anyhow::Result<SqliteStore> {
    let path = config::resolve_store_path(flag)?;
    log::debug!("opening store at {}", path.display());
    Ok(SqliteStore::open(&path)?)
}

fn parse_uuid(value: &str) -> anyhow::Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| anyhow::anyhow!("Invalid ID \"{}\": {}", value, e))
}

fn ensure_known_type(factory: &ElementFactory, element_type: &str) -> anyhow::Result<()> {
    if factory.registered_types().any(|t| t == element_type) {
        return Ok(());
    }
    let mut known: Vec<&str> = factory.registered_types().collect();
    known.sort_unstable();
    Err(anyhow::anyhow!(
        "Unknown element type: {} (known types: {})",
        element_type,
        known.join(", ")
    ))
}

fn parse_direction(value: &str) -> anyhow::Result<MoveDirection> {
    match value {
        "up" => Ok(MoveDirection::Up),
        "down" => Ok(MoveDirection::Down),
        other => Err(anyhow::anyhow!(
            "Invalid direction: {} (use up or down)",
            other
        )),
    }
}

fn run_template_command(
    store: &mut SqliteStore,
    command: TemplateCommands,
    quiet: bool,
) -> anyhow::Result<()> {
    let factory = ElementFactory::with_builtins();

    match command {
        TemplateCommands::Create { name, context } => {
            let template = Template::create(store, name, context)?;
            if quiet {
                println!("{}", template.id());
            } else {
                println!("Created template {} ({})", template.name(), template.id());
            }
        }
        TemplateCommands::List { json } => {
            let templates = store.list_templates()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&templates)?);
            } else {
                if !quiet {
                    println!("ID | NAME | PAGES | MODIFIED");
                }
                for record in templates {
                    let pages = store.list_pages(record.id)?.len();
                    println!(
                        "{} | {} | {} | {}",
                        record.id, record.name, pages, record.modified_at
                    );
                }
            }
        }
        TemplateCommands::Show { id } => {
            let template = Template::load(store, parse_uuid(&id)?)?;
            println!("ID: {}", template.id());
            println!("Name: {}", template.name());
            println!("Context: {}", template.context_id());
            for page in store.list_pages(template.id())? {
                println!(
                    "  Page {} ({}): {}x{} mm",
                    page.sequence, page.id, page.width, page.height
                );
                for element in store.list_elements(page.id)? {
                    println!(
                        "    Element {} ({}): {}",
                        element.sequence, element.id, element.element_type
                    );
                }
            }
        }
        TemplateCommands::Rename { id, name } => {
            let mut template = Template::load(store, parse_uuid(&id)?)?;
            template.save(store, name)?;
            if !quiet {
                println!("Renamed template {} to {}", template.id(), template.name());
            }
        }
        TemplateCommands::Delete { id } => {
            let template = Template::load(store, parse_uuid(&id)?)?;
            let template_id = template.id();
            template.delete(store, &factory)?;
            if !quiet {
                println!("Deleted template {}", template_id);
            }
        }
        TemplateCommands::Copy { source, target } => {
            let source = Template::load(store, parse_uuid(&source)?)?;
            let target_id = parse_uuid(&target)?;
            source.copy_to(store, &factory, target_id)?;
            if !quiet {
                println!("Copied template {} into {}", source.id(), target_id);
            }
        }
    }
    Ok(())
}

fn run_page_command(
    store: &mut SqliteStore,
    command: PageCommands,
    quiet: bool,
) -> anyhow::Result<()> {
    let factory = ElementFactory::with_builtins();

    match command {
        PageCommands::Add { template } => {
            let template = Template::load(store, parse_uuid(&template)?)?;
            let page_id = template.add_page(store)?;
            if quiet {
                println!("{}", page_id);
            } else {
                println!("Added page {}", page_id);
            }
        }
        PageCommands::Delete { template, page } => {
            let template = Template::load(store, parse_uuid(&template)?)?;
            let page_id = parse_uuid(&page)?;
            template.delete_page(store, &factory, page_id)?;
            if !quiet {
                println!("Deleted page {}", page_id);
            }
        }
        PageCommands::Move {
            template,
            page,
            direction,
        } => {
            let template = Template::load(store, parse_uuid(&template)?)?;
            let page_id = parse_uuid(&page)?;
            let direction = parse_direction(&direction)?;
            template.move_item(store, MoveKind::Page, page_id, direction)?;
            if !quiet {
                println!("Moved page {}", page_id);
            }
        }
        PageCommands::SetSize {
            template,
            page,
            width,
            height,
            left_margin,
            right_margin,
        } => {
            let template = Template::load(store, parse_uuid(&template)?)?;
            let page_id = parse_uuid(&page)?;
            let record: PageRecord = store
                .get_page(page_id)?
                .ok_or_else(|| anyhow::anyhow!("Page {} not found", page_id))?;

            let mut metrics = record.metrics();
            if let Some(value) = width {
                metrics.width = value;
            }
            if let Some(value) = height {
                metrics.height = value;
            }
            if let Some(value) = left_margin {
                metrics.left_margin = value;
            }
            if let Some(value) = right_margin {
                metrics.right_margin = value;
            }

            template.save_pages(store, &[PageMetricsUpdate { page_id, metrics }])?;
            if !quiet {
                println!("Updated page {}", page_id);
            }
        }
    }
    Ok(())
}

fn run_element_command(
    store: &mut SqliteStore,
    command: ElementCommands,
    quiet: bool,
) -> anyhow::Result<()> {
    let factory = ElementFactory::with_builtins();

    match command {
        ElementCommands::Add {
            template,
            page,
            element_type,
            data,
        } => {
            ensure_known_type(&factory, &element_type)?;
            let template = Template::load(store, parse_uuid(&template)?)?;
            let page_id = parse_uuid(&page)?;
            let data: serde_json::Value = serde_json::from_str(&data)
                .map_err(|e| anyhow::anyhow!("Invalid element payload: {}", e))?;

            let element_id = template.add_element(store, page_id, element_type, data)?;
            if quiet {
                println!("{}", element_id);
            } else {
                println!("Added element {}", element_id);
            }
        }
        ElementCommands::Edit {
            template,
            element,
            data,
        } => {
            let template = Template::load(store, parse_uuid(&template)?)?;
            let element_id = parse_uuid(&element)?;
            let data: serde_json::Value = serde_json::from_str(&data)
                .map_err(|e| anyhow::anyhow!("Invalid element payload: {}", e))?;

            template.save_element(store, element_id, data)?;
            if !quiet {
                println!("Updated element {}", element_id);
            }
        }
        ElementCommands::List { page, json } => {
            let elements = store.list_elements(parse_uuid(&page)?)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&elements)?);
            } else {
                if !quiet {
                    println!("SEQ | ID | TYPE");
                }
                for element in elements {
                    println!(
                        "{} | {} | {}",
                        element.sequence, element.id, element.element_type
                    );
                }
            }
        }
        ElementCommands::Delete { template, element } => {
            let template = Template::load(store, parse_uuid(&template)?)?;
            let element_id = parse_uuid(&element)?;
            template.delete_element(store, &factory, element_id)?;
            if !quiet {
                println!("Deleted element {}", element_id);
            }
        }
        ElementCommands::Move {
            template,
            element,
            direction,
        } => {
            let template = Template::load(store, parse_uuid(&template)?)?;
            let element_id = parse_uuid(&element)?;
            let direction = parse_direction(&direction)?;
            template.move_item(store, MoveKind::Element, element_id, direction)?;
            if !quiet {
                println!("Moved element {}", element_id);
            }
        }
    }
    Ok(())
}

fn build_render_options(
    preview: bool,
    name: Option<String>,
    course: Option<String>,
    date: Option<String>,
    stream: bool,
) -> anyhow::Result<RenderOptions> {
    let output = if stream {
        OutputMode::Stream
    } else {
        OutputMode::Return
    };

    if preview {
        return Ok(RenderOptions {
            preview: true,
            subject: None,
            output,
        });
    }

    let full_name = name.ok_or_else(|| anyhow::anyhow!("--name is required (or use --preview)"))?;
    let course =
        course.ok_or_else(|| anyhow::anyhow!("--course is required (or use --preview)"))?;
    let awarded_on = match date {
        Some(value) => Some(
            NaiveDate::parse_from_str(&value, "%Y-%m-%d")
                .map_err(|e| anyhow::anyhow!("Invalid date (expected YYYY-MM-DD): {}", e))?,
        ),
        None => None,
    };

    Ok(RenderOptions {
        preview: false,
        subject: Some(Subject {
            full_name,
            course,
            awarded_on,
            fields: Default::default(),
        }),
        output,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_element_type_is_rejected() {
        let factory = ElementFactory::with_builtins();
        assert!(ensure_known_type(&factory, "text").is_ok());

        let err = ensure_known_type(&factory, "hologram").unwrap_err();
        assert!(err.to_string().contains("known types"));
    }

    #[test]
    fn test_parse_direction() {
        assert!(matches!(parse_direction("up"), Ok(MoveDirection::Up)));
        assert!(matches!(parse_direction("down"), Ok(MoveDirection::Down)));
        assert!(parse_direction("sideways").is_err());
    }

    #[test]
    fn test_render_options_require_subject_without_preview() {
        assert!(build_render_options(false, None, None, None, false).is_err());

        let options = build_render_options(
            false,
            Some("Ada Lovelace".to_string()),
            Some("Analytical Engines".to_string()),
            Some("2024-06-01".to_string()),
            false,
        )
        .unwrap();
        assert!(!options.preview);
        assert_eq!(options.subject.unwrap().full_name, "Ada Lovelace");
    }

    #[test]
    fn test_preview_ignores_subject_fields() {
        let options = build_render_options(true, None, None, None, true).unwrap();
        assert!(options.preview);
        assert!(options.subject.is_none());
        assert!(matches!(options.output, OutputMode::Stream));
    }
}
