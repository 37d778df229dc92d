// Report gateway command line
//
// Manages report records and renders them through the same cache controller
// the web layer uses. Configuration comes from the environment (see
// `GatewayConfigBuilder::from_lookup`).

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use reports_gateway::{
    GatewayConfigBuilder, ReportCacheController, ReportError, ReportForm, ReportRequest, ReportStore,
    SqliteReportStore, ViewResponse, populated_categories, recent_activity, report_view,
    utils::RECENT_ACTIVITY_LIMIT,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Database URL (overrides DATABASE_URL)
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a report; runs the same validation as the admin form
    Add {
        #[arg(long)]
        menu_name: String,
        #[arg(long, default_value = "Reports")]
        category: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        authors: Option<String>,
        #[arg(long)]
        contact_email: Option<String>,
        /// YYYY-MM-DD (default: today)
        #[arg(long)]
        publication_date: Option<NaiveDate>,
        #[arg(long)]
        repo: Option<String>,
        #[arg(long)]
        branch: Option<String>,
        /// Path of the HTML file within the repository
        #[arg(long)]
        path: Option<String>,
        #[arg(long)]
        job_server_url: Option<String>,
        #[arg(long)]
        draft: bool,
    },

    /// Render a report the way its page would
    Render {
        slug: String,
        /// Cache token from the report URL
        #[arg(long)]
        token: Option<String>,
        #[arg(long)]
        force_update: bool,
        /// Allow rendering draft reports
        #[arg(long)]
        drafts: bool,
    },

    /// List reports grouped by category
    List,

    /// Show recent publications and updates
    Activity {
        #[arg(long, default_value_t = RECENT_ACTIVITY_LIMIT)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut builder = GatewayConfigBuilder::from_lookup(|key| std::env::var(key).ok())
        .context("Invalid configuration")?;
    if let Some(url) = args.database_url {
        builder = builder.database_url(url);
    }
    let config = builder.build().context("Invalid configuration")?;

    let store = Arc::new(
        SqliteReportStore::open(config.database_url())
            .await
            .with_context(|| format!("Failed to open database {}", config.database_url()))?,
    );
    let controller = ReportCacheController::open(&config, store.clone())
        .await
        .context("Failed to set up report fetchers")?;

    match args.command {
        Command::Add {
            menu_name,
            category,
            title,
            description,
            authors,
            contact_email,
            publication_date,
            repo,
            branch,
            path,
            job_server_url,
            draft,
        } => {
            let form = ReportForm {
                menu_name,
                category,
                title,
                description,
                authors,
                contact_email,
                publication_date: publication_date.unwrap_or_else(|| chrono::Utc::now().date_naive()),
                repo,
                branch,
                report_html_file_path: path,
                job_server_url,
                is_draft: draft,
            };
            match controller.create(form).await {
                Ok(report) => println!("{}", report.absolute_url()),
                Err(ReportError::Validation(errors)) => {
                    for error in errors.errors() {
                        match error.field {
                            Some(field) => eprintln!("{field}: {}", error.message),
                            None => eprintln!("{}", error.message),
                        }
                    }
                    bail!("Report is not valid");
                }
                Err(e) => return Err(e).context("Failed to create report"),
            }
        }

        Command::Render {
            slug,
            token,
            force_update,
            drafts,
        } => {
            let request = ReportRequest {
                slug: &slug,
                cache_token: token.as_deref(),
                force_update,
                can_view_drafts: drafts,
            };
            match report_view(&controller, request).await.context("Failed to render report")? {
                ViewResponse::Page(page) => {
                    for style in &page.styles {
                        println!("{style}");
                    }
                    println!("{}", page.notebook_contents);
                }
                ViewResponse::Redirect(location) => eprintln!("Redirect: {location}"),
                ViewResponse::NotFound => bail!("No report '{slug}'"),
            }
        }

        Command::List => {
            let reports = store.list().await?;
            for category in populated_categories(&reports) {
                println!("{category}");
                for report in reports.iter().filter(|r| r.category == category) {
                    let draft = if report.is_draft { " (draft)" } else { "" };
                    println!("  {}{draft}  {}", report.menu_name, report.absolute_url());
                }
            }
        }

        Command::Activity { limit } => {
            let reports = store.list().await?;
            let visible: Vec<_> = reports.into_iter().filter(|r| !r.is_draft).collect();
            for activity in recent_activity(&visible, limit) {
                println!("{}  {:?}  {}", activity.date, activity.kind, activity.menu_name);
            }
        }
    }

    controller
        .persist_cache(&config)
        .await
        .context("Failed to save HTTP cache snapshot")?;
    Ok(())
}
