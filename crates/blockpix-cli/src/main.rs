//! Batch driver for the blockpix decoder.
//!
//! Enumerates input containers, decodes each one through
//! `blockpix-core`, and writes one lossless PNG per success. Failures are
//! reported per file and skipped; the core carries no shared state, so a
//! bad input never poisons the rest of the batch. The exit code is
//! nonzero when any file failed.

mod convert;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use argh::FromArgs;
use blockpix_core::{
    decode_to_tensor, decode_to_tensor_as, probe_with_extensions, ExtensionTag, ImageInfo,
    OutputFormat,
};
use serde::Serialize;

/// File extension scanned for when an input is a directory.
const CONTAINER_EXTENSION: &str = "blk";

#[derive(FromArgs)]
/// Decode block-compressed image containers into lossless PNG files.
struct Args {
    /// container files, or directories to scan for .blk files
    #[argh(positional)]
    inputs: Vec<PathBuf>,

    /// directory for decoded PNGs (default: alongside each input)
    #[argh(option, short = 'o')]
    out_dir: Option<PathBuf>,

    /// output format override: rgb24, rgba32, rgb48, rgba64, cmyk32, cmyk64
    #[argh(option, from_str_fn(parse_format))]
    format: Option<OutputFormat>,

    /// print structural info as JSON instead of decoding pixels
    #[argh(switch)]
    probe: bool,
}

/// JSON shape for `--probe` output.
#[derive(Debug, Serialize)]
struct ProbeReport {
    path: String,
    info: ImageInfo,
    extensions: Vec<ExtensionSummary>,
}

#[derive(Debug, Serialize)]
struct ExtensionSummary {
    tag: ExtensionTag,
    bytes: usize,
}

fn parse_format(value: &str) -> Result<OutputFormat, String> {
    match value.to_ascii_lowercase().as_str() {
        "rgb24" => Ok(OutputFormat::Rgb24),
        "rgba32" => Ok(OutputFormat::Rgba32),
        "rgb48" => Ok(OutputFormat::Rgb48),
        "rgba64" => Ok(OutputFormat::Rgba64),
        "cmyk32" => Ok(OutputFormat::Cmyk32),
        "cmyk64" => Ok(OutputFormat::Cmyk64),
        other => Err(format!("unknown output format '{other}'")),
    }
}

/// Expand files and directories into the list of containers to decode.
fn collect_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>, String> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let entries = fs::read_dir(input)
                .map_err(|e| format!("cannot read directory {}: {e}", input.display()))?;
            let mut found: Vec<PathBuf> = entries
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|path| {
                    path.extension()
                        .is_some_and(|ext| ext.eq_ignore_ascii_case(CONTAINER_EXTENSION))
                })
                .collect();
            found.sort();
            files.extend(found);
        } else {
            files.push(input.clone());
        }
    }
    Ok(files)
}

/// Where the decoded PNG for `input` goes.
fn output_path(input: &Path, out_dir: Option<&Path>) -> PathBuf {
    match out_dir {
        Some(dir) => {
            let stem = input.file_stem().unwrap_or_default();
            dir.join(stem).with_extension("png")
        }
        None => input.with_extension("png"),
    }
}

/// Decode one container and write its PNG (or print its probe report).
fn process_file(path: &Path, args: &Args) -> Result<(), String> {
    let bytes = fs::read(path).map_err(|e| format!("read failed: {e}"))?;

    if args.probe {
        let (info, extensions) =
            probe_with_extensions(&bytes).map_err(|e| e.to_string())?;
        let report = ProbeReport {
            path: path.display().to_string(),
            info,
            extensions: extensions
                .iter()
                .map(|record| ExtensionSummary {
                    tag: record.tag,
                    bytes: record.len(),
                })
                .collect(),
        };
        let json = serde_json::to_string_pretty(&report).map_err(|e| e.to_string())?;
        println!("{json}");
        return Ok(());
    }

    let tensor = match args.format {
        Some(format) => decode_to_tensor_as(&bytes, format),
        None => decode_to_tensor(&bytes),
    }
    .map_err(|e| e.to_string())?;

    let [height, width, channels] = tensor.shape();
    let image = convert::tensor_to_image(tensor).map_err(|e| e.to_string())?;

    let out = output_path(path, args.out_dir.as_deref());
    image
        .save_with_format(&out, image::ImageFormat::Png)
        .map_err(|e| format!("write failed: {e}"))?;

    println!(
        "{} -> {} ({}x{}, {} channels)",
        path.display(),
        out.display(),
        width,
        height,
        channels
    );
    Ok(())
}

fn run(args: &Args) -> Result<usize, String> {
    if args.inputs.is_empty() {
        return Err("no inputs given".to_string());
    }
    if let Some(dir) = &args.out_dir {
        fs::create_dir_all(dir).map_err(|e| format!("cannot create {}: {e}", dir.display()))?;
    }

    let files = collect_inputs(&args.inputs)?;
    if files.is_empty() {
        return Err("no container files found".to_string());
    }

    let mut failures = 0;
    for file in &files {
        if let Err(message) = process_file(file, args) {
            eprintln!("{}: {message}", file.display());
            failures += 1;
        }
    }
    Ok(failures)
}

fn main() -> ExitCode {
    let args: Args = argh::from_env();
    match run(&args) {
        Ok(0) => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockpix_core::engine::container::{self, Compression};
    use blockpix_core::{ColorSpace, PixelFormat};

    fn fixture_bytes(width: u32, height: u32) -> Vec<u8> {
        let info = ImageInfo {
            width,
            height,
            bit_depth: 8,
            color_space: ColorSpace::Rgb,
            format: PixelFormat::Chroma444,
            ..Default::default()
        };
        let samples = vec![66u8; (width * height) as usize * 3];
        container::encode(&info, &samples, &[], Compression::Rle)
    }

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "blockpix-cli-test-{tag}-{}",
            std::process::id()
        ));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_parse_format() {
        assert_eq!(parse_format("rgb24"), Ok(OutputFormat::Rgb24));
        assert_eq!(parse_format("CMYK64"), Ok(OutputFormat::Cmyk64));
        assert!(parse_format("bgr24").is_err());
    }

    #[test]
    fn test_output_path() {
        let input = Path::new("/data/shots/img01.blk");
        assert_eq!(
            output_path(input, None),
            PathBuf::from("/data/shots/img01.png")
        );
        assert_eq!(
            output_path(input, Some(Path::new("/tmp/out"))),
            PathBuf::from("/tmp/out/img01.png")
        );
    }

    #[test]
    fn test_process_file_writes_png() {
        let dir = temp_dir("decode");
        let input = dir.join("solid.blk");
        fs::write(&input, fixture_bytes(4, 4)).unwrap();

        let args = Args {
            inputs: vec![input.clone()],
            out_dir: None,
            format: None,
            probe: false,
        };
        process_file(&input, &args).unwrap();

        let png = fs::read(dir.join("solid.png")).unwrap();
        // PNG signature.
        assert_eq!(&png[..8], &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]);
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_batch_skips_failed_files() {
        let dir = temp_dir("batch");
        fs::write(dir.join("good.blk"), fixture_bytes(2, 2)).unwrap();
        fs::write(dir.join("bad.blk"), b"not a container").unwrap();

        let args = Args {
            inputs: vec![dir.clone()],
            out_dir: None,
            format: None,
            probe: false,
        };
        let failures = run(&args).unwrap();
        assert_eq!(failures, 1);
        // The good file still decoded.
        assert!(dir.join("good.png").exists());
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_collect_inputs_filters_extension() {
        let dir = temp_dir("collect");
        fs::write(dir.join("a.blk"), b"x").unwrap();
        fs::write(dir.join("b.txt"), b"x").unwrap();
        fs::write(dir.join("c.BLK"), b"x").unwrap();

        let files = collect_inputs(&[dir.clone()]).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|f| f
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("blk"))));
        fs::remove_dir_all(dir).unwrap();
    }
}
