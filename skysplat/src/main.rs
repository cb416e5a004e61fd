use clap::{Parser, Subcommand};
use skysplat_lib::codec::dump_header;
use skysplat_lib::config::{parse_rgb, PlaneParams, SphereParams};
use skysplat_lib::reader::{export_xyz, AssetInfo, AssetReader, RecordSummary};
use skysplat_lib::{generate_plane_file, generate_sphere_file, recolor_file, run_batch, BatchReport};
use std::error::Error;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::time::Instant;

const SPHERE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "tif", "tiff", "bmp", "hdr", "exr"];
const PLANE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "tif", "tiff", "bmp"];

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Build sky spheres from equirectangular images")]
    Sphere {
        #[arg(
            short = 'i',
            long = "input",
            value_name = "INPUT",
            default_value = ".",
            help = "Image file, or a directory scanned for images."
        )]
        input: PathBuf,

        #[arg(
            short = 'o',
            long = "output-dir",
            value_name = "DIR",
            help = "Directory for the generated assets (defaults to next to each image)."
        )]
        output_dir: Option<PathBuf>,

        #[arg(
            short = 'n',
            long = "samples",
            value_name = "COUNT",
            help = "Number of points (default 100000)."
        )]
        samples: Option<String>,

        #[arg(
            short = 'r',
            long = "radius",
            value_name = "RADIUS",
            help = "Sphere radius (default 100.0)."
        )]
        radius: Option<String>,

        #[arg(short = 's', long = "seed", help = "Seed for the residual noise.")]
        seed: Option<u64>,

        #[arg(
            long = "flip-vertical",
            default_value = "false",
            help = "Map the top of the sphere to the bottom image row, like older assets."
        )]
        flip_vertical: bool,
    },

    #[command(about = "Build flat ground disks from images")]
    Plane {
        #[arg(
            short = 'i',
            long = "input",
            value_name = "INPUT",
            default_value = ".",
            help = "Image file, or a directory scanned for images."
        )]
        input: PathBuf,

        #[arg(
            short = 'o',
            long = "output-dir",
            value_name = "DIR",
            help = "Directory for the generated assets (defaults to next to each image)."
        )]
        output_dir: Option<PathBuf>,

        #[arg(
            short = 'n',
            long = "samples",
            value_name = "COUNT",
            help = "Requested number of points (default 40000)."
        )]
        samples: Option<String>,

        #[arg(
            short = 'd',
            long = "diameter",
            value_name = "SIZE",
            help = "Disk diameter (default 200.0)."
        )]
        diameter: Option<String>,

        #[arg(short = 's', long = "seed", help = "Seed for the residual noise.")]
        seed: Option<u64>,
    },

    #[command(about = "Copy an asset with every point set to one colour")]
    Recolor {
        #[arg(
            short = 't',
            long = "template",
            value_name = "TEMPLATE",
            default_value = "skybox.ply",
            help = "Asset whose geometry is reused."
        )]
        template: PathBuf,

        #[arg(
            short = 'c',
            long = "color",
            value_name = "RGB",
            help = "Colour as r,g,b or r g b or #rrggbb."
        )]
        color: String,

        #[arg(
            short = 'o',
            long = "output-dir",
            value_name = "DIR",
            default_value = "solid_skyboxes",
            help = "Directory for the recoloured asset."
        )]
        output_dir: PathBuf,
    },

    #[command(about = "Print per-point diagnostics of an asset")]
    Inspect {
        #[arg(
            short = 'i',
            long = "input",
            value_name = "INPUT",
            default_value = "skybox.ply",
            help = "Path to the asset."
        )]
        input: PathBuf,

        #[arg(
            short = 'n',
            long = "records",
            default_value = "5",
            help = "Number of leading records to summarize."
        )]
        records: usize,

        #[arg(
            short = 'w',
            long = "write-files",
            default_value = "false",
            help = "Also write <stem>_info.txt and <stem>_xyz.txt next to the input."
        )]
        write_files: bool,
    },

    #[command(about = "Print the text header of an asset")]
    Header {
        #[arg(
            short = 'i',
            long = "input",
            value_name = "INPUT",
            default_value = "skybox.ply",
            help = "Path to the asset."
        )]
        input: PathBuf,

        #[arg(
            long = "save",
            value_name = "FILE",
            help = "Also save the header text to this file."
        )]
        save: Option<PathBuf>,
    },
}

#[derive(Parser, Debug)]
#[command(
    name = "skysplat",
    version = "1.0",
    author = "Denis Avvakumov",
    about = "Builds Gaussian splat skyboxes and ground planes from images"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

fn find_images(input: &Path, extensions: &[&str]) -> Result<Vec<PathBuf>, Box<dyn Error + Send + Sync>> {
    if input.is_file() {
        return Ok(vec![input.to_path_buf()]);
    }
    let mut images: Vec<PathBuf> = fs::read_dir(input)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| extensions.contains(&e.to_ascii_lowercase().as_str()))
        })
        .collect();
    images.sort();
    Ok(images)
}

fn output_for(image: &Path, output_dir: Option<&Path>, suffix: &str) -> PathBuf {
    let stem = image
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let dir = output_dir
        .map(Path::to_path_buf)
        .or_else(|| image.parent().map(Path::to_path_buf))
        .unwrap_or_default();
    dir.join(format!("{}{}.ply", stem, suffix))
}

fn print_report(report: &BatchReport) {
    for (input, err) in &report.failed {
        eprintln!("Error processing '{}': {}", input.display(), err);
    }
    println!(
        "Finished: {} succeeded, {} failed.",
        report.succeeded.len(),
        report.failed.len()
    );
}

fn sibling(input: &Path, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    input.with_file_name(format!("{}{}", stem, suffix))
}

fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    env_logger::init();
    let cli = Cli::parse();
    let start = Instant::now();

    match cli.command {
        Commands::Sphere {
            input,
            output_dir,
            samples,
            radius,
            seed,
            flip_vertical,
        } => {
            let params = SphereParams {
                seed,
                flip_vertical,
                ..SphereParams::from_raw(samples.as_deref(), radius.as_deref())
            };
            let images = find_images(&input, SPHERE_EXTENSIONS)?;
            if images.is_empty() {
                eprintln!("No image files found in '{}'.", input.display());
                process::exit(1);
            }
            if let Some(dir) = &output_dir {
                fs::create_dir_all(dir)?;
            }
            println!(
                "Mode: Sphere | Images: {} | Points: {} | Radius: {}",
                images.len(),
                params.samples,
                params.radius
            );
            let report = run_batch(images, |image| {
                let output = output_for(image, output_dir.as_deref(), "_skysphere");
                let n = generate_sphere_file(image, &output, &params)?;
                println!("Processed: {} -> {}", image.display(), output.display());
                Ok(n)
            });
            print_report(&report);
        }
        Commands::Plane {
            input,
            output_dir,
            samples,
            diameter,
            seed,
        } => {
            let params = PlaneParams {
                seed,
                ..PlaneParams::from_raw(samples.as_deref(), diameter.as_deref())
            };
            let images = find_images(&input, PLANE_EXTENSIONS)?;
            if images.is_empty() {
                eprintln!("No image files found in '{}'.", input.display());
                process::exit(1);
            }
            if let Some(dir) = &output_dir {
                fs::create_dir_all(dir)?;
            }
            println!(
                "Mode: Plane | Images: {} | Requested points: {} | Diameter: {}",
                images.len(),
                params.samples,
                params.diameter
            );
            let report = run_batch(images, |image| {
                let output = output_for(image, output_dir.as_deref(), "_ground");
                let n = generate_plane_file(image, &output, &params)?;
                println!(
                    "Processed: {} -> {} ({} points)",
                    image.display(),
                    output.display(),
                    n
                );
                Ok(n)
            });
            print_report(&report);
        }
        Commands::Recolor {
            template,
            color,
            output_dir,
        } => {
            let rgb = parse_rgb(&color).unwrap_or_else(|| {
                eprintln!("Error: unrecognized colour '{}'.", color);
                process::exit(1);
            });
            fs::create_dir_all(&output_dir)?;
            let output = output_dir.join(format!("skybox_rgb_{}_{}_{}.ply", rgb[0], rgb[1], rgb[2]));
            recolor_file(&template, &output, rgb)?;
            println!("Successfully wrote to '{}'.", output.display());
        }
        Commands::Inspect {
            input,
            records,
            write_files,
        } => {
            let mut reader = AssetReader::new(BufReader::new(File::open(&input)?))?;
            if let Err(e) = reader.check_length() {
                log::warn!("{}: {}", input.display(), e);
            }
            let info = AssetInfo::new(input.display().to_string(), reader.header());
            print!("{}", info);

            for (i, record) in reader.records()?.take(records).enumerate() {
                println!("\n{}", RecordSummary::new(i, &record?));
            }

            if write_files {
                let info_path = sibling(&input, "_info.txt");
                fs::write(&info_path, info.to_string())?;
                let xyz_path = sibling(&input, "_xyz.txt");
                let mut out = BufWriter::new(File::create(&xyz_path)?);
                export_xyz(&mut reader, &mut out)?;
                out.flush()?;
                println!(
                    "\nWrote '{}' and '{}'.",
                    info_path.display(),
                    xyz_path.display()
                );
            }
        }
        Commands::Header { input, save } => {
            let raw = fs::read(&input).unwrap_or_else(|e| {
                eprintln!("Error reading input file {}: {}", input.display(), e);
                process::exit(1);
            });
            let header = dump_header(&raw);
            println!("{}", header);
            if let Some(path) = save {
                fs::write(&path, &header)?;
                println!("Header saved to '{}'.", path.display());
            }
        }
    }

    println!("Time: {} ms", start.elapsed().as_millis());
    Ok(())
}
