#[cfg(not(feature = "export"))]
fn main() {
    eprintln!(
        "The opl3 CLI requires the \"export\" feature. Rebuild with `--features export` to enable IMF to WAV conversion."
    );
}

#[cfg(feature = "export")]
mod cli {
    use std::env;
    use std::path::{Path, PathBuf};

    use anyhow::{bail, Context, Result};
    use opl3::export::{export_to_wav_with_config, ExportConfig};
    use opl3::replayer::{ImfPlayer, IMF_RATE_KEEN, IMF_RATE_WOLF3D};

    const DEFAULT_SAMPLE_RATE: u32 = 44_100;

    struct Options {
        input: PathBuf,
        output: PathBuf,
        sample_rate: u32,
        imf_rate: u32,
        volume_boost: u8,
    }

    fn print_usage(program: &str) {
        eprintln!("Usage: {} <input.imf> [output.wav] [options]", program);
        eprintln!();
        eprintln!("Options:");
        eprintln!("  --rate <hz>      Output sample rate (default {})", DEFAULT_SAMPLE_RATE);
        eprintln!("  --imf-rate <hz>  Song clock: {} for Wolfenstein 3D (default),", IMF_RATE_WOLF3D);
        eprintln!("                   {} for Commander Keen era files", IMF_RATE_KEEN);
        eprintln!("  --boost <0-4>    Volume boost applied before clipping");
    }

    fn parse_options(args: &[String]) -> Result<Options> {
        let mut input: Option<PathBuf> = None;
        let mut output: Option<PathBuf> = None;
        let mut sample_rate = DEFAULT_SAMPLE_RATE;
        let mut imf_rate = IMF_RATE_WOLF3D;
        let mut volume_boost = 0u8;

        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--rate" => {
                    let value = iter.next().context("--rate requires a value")?;
                    sample_rate = value.parse().context("invalid --rate value")?;
                }
                "--imf-rate" => {
                    let value = iter.next().context("--imf-rate requires a value")?;
                    imf_rate = value.parse().context("invalid --imf-rate value")?;
                }
                "--boost" => {
                    let value = iter.next().context("--boost requires a value")?;
                    volume_boost = value.parse().context("invalid --boost value")?;
                    if volume_boost > 4 {
                        bail!("--boost must be between 0 and 4");
                    }
                }
                flag if flag.starts_with("--") => bail!("unknown option {}", flag),
                path if input.is_none() => input = Some(PathBuf::from(path)),
                path if output.is_none() => output = Some(PathBuf::from(path)),
                path => bail!("unexpected argument {}", path),
            }
        }

        let input = input.context("missing input file")?;
        let output = output.unwrap_or_else(|| input.with_extension("wav"));
        Ok(Options {
            input,
            output,
            sample_rate,
            imf_rate,
            volume_boost,
        })
    }

    fn convert(options: &Options) -> Result<()> {
        let data = std::fs::read(&options.input)
            .with_context(|| format!("reading {}", options.input.display()))?;
        let (mut player, info) = ImfPlayer::load(&data, options.sample_rate, options.imf_rate)
            .with_context(|| format!("parsing {}", options.input.display()))?;

        let seconds = info.total_frames() as f32 / options.sample_rate as f32;
        println!(
            "Converting {} ({} commands, {:.1}s at {} Hz song clock)...",
            file_name(&options.input),
            info.command_count,
            seconds,
            info.tick_rate
        );

        let config = ExportConfig::default().volume_boost(options.volume_boost);
        export_to_wav_with_config(&mut player, &info, &options.output, config)
            .with_context(|| format!("writing {}", options.output.display()))?;

        println!("Wrote {}.", options.output.display());
        Ok(())
    }

    fn file_name(path: &Path) -> String {
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string())
    }

    pub fn run() -> Result<()> {
        let args: Vec<String> = env::args().collect();
        let program = args
            .first()
            .map(String::as_str)
            .unwrap_or("opl3")
            .to_string();
        if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
            print_usage(&program);
            std::process::exit(2);
        }
        let options = parse_options(&args[1..])?;
        convert(&options)
    }
}

#[cfg(feature = "export")]
fn main() -> anyhow::Result<()> {
    cli::run()
}
