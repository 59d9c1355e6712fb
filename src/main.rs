use anyhow::Result;
use basepub::config::{Config, Profile};
use basepub::{cleanup, convert, fetch, notify, publish};
use chrono::Local;
use clap::{CommandFactory, Parser};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

/// Download the current public base spreadsheet from Drive, convert the
/// tracked columns to JSON and optionally publish and announce the result.
#[derive(Parser, Debug)]
#[command(name = "basepub", version, disable_version_flag = true)]
struct Args {
    /// show program version
    #[arg(short = 'v', long = "version", action = clap::ArgAction::Version)]
    version: Option<bool>,

    /// type of base: [desligados|leak]
    #[arg(short, long, value_enum)]
    base: Option<Profile>,

    /// delete the generated json and downloaded xlsx afterwards
    #[arg(short, long)]
    delete: bool,
}

#[tokio::main]
async fn main() {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(env).init();

    let args = Args::parse();
    let Some(profile) = args.base else {
        Args::command().print_help().ok();
        return;
    };

    let cfg = Config::default();
    if let Err(err) = run(profile, &cfg, args.delete).await {
        error!("{err:#}");
        std::process::exit(1);
    }
}

async fn run(profile: Profile, cfg: &Config, delete: bool) -> Result<()> {
    info!(profile = profile.label(), "startup");
    let stages = profile.stages();

    // ─── 2) fetch today's spreadsheet ────────────────────────────────
    let xlsx = fetch::fetch(cfg).await?;
    info!(file = %xlsx.display(), "downloaded");

    // ─── 3) convert to the dated record file ─────────────────────────
    let today = Local::now().date_naive();
    let json = {
        let xlsx = xlsx.clone();
        let out_dir = cfg.work_dir.clone();
        tokio::task::spawn_blocking(move || convert::convert(&xlsx, &out_dir, today)).await??
    };

    // ─── 4) publish to the bucket ────────────────────────────────────
    if stages.publish {
        publish::upload(cfg, &json).await?;
    }

    // ─── 5) notify the channel ───────────────────────────────────────
    if stages.notify {
        let file_name = json
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let message = format!(
            "[Automate public base - {}]\n *Arquivo:* {}",
            profile.label(),
            file_name
        );
        notify::send(cfg, &message).await;
    }

    // ─── 6) optional cleanup ─────────────────────────────────────────
    if delete {
        cleanup::remove_artifacts(&json, &xlsx)?;
    }

    info!("all done");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_profile_and_delete_flag() {
        let args = Args::try_parse_from(["basepub", "--base", "leak", "-d"]).unwrap();
        assert_eq!(args.base, Some(Profile::Leak));
        assert!(args.delete);
    }

    #[test]
    fn parses_desligados_short_flag() {
        let args = Args::try_parse_from(["basepub", "-b", "desligados"]).unwrap();
        assert_eq!(args.base, Some(Profile::Desligados));
        assert!(!args.delete);
    }

    #[test]
    fn rejects_unknown_profile() {
        assert!(Args::try_parse_from(["basepub", "--base", "other"]).is_err());
    }

    #[test]
    fn no_flags_parses_to_no_profile() {
        let args = Args::try_parse_from(["basepub"]).unwrap();
        assert!(args.base.is_none());
        assert!(!args.delete);
    }
}
