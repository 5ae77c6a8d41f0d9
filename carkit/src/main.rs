mod output;

use anyhow::{Context, Result};
use carkit_core::{
    Blockstore, CarReader, Cid, Codec, DagWalker, FsBlockstore, HashAlgorithm, Ipld, load_car,
    parse_cid, verify_car, walk_roots, write_car,
};
use clap::{Parser, Subcommand};
use output::{
    EntryInfo, ExportOutput, ImportOutput, InitOutput, LsOutput, OutputWriter, PutOutput,
    VerifyOutput, WalkOutput, WalkedBlock, cid_strings, codec_name,
};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Carkit - content-addressable archives over a block store
#[derive(Parser)]
#[command(name = "carkit")]
#[command(about = "Build, export and import CARv1 archives", long_about = None)]
#[command(version)]
struct Cli {
    /// Store root directory (defaults to CARKIT_ROOT env var or ./carkit-store)
    #[arg(short, long, global = true)]
    root: Option<PathBuf>,

    /// Output results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new block store
    Init {
        /// Hash function for new blocks (sha2-256 or blake3)
        #[arg(long, default_value = "sha2-256")]
        algo: String,
    },

    /// Store a file as a single block
    Put {
        /// File to store (reads stdin if omitted)
        path: Option<PathBuf>,

        /// Block codec (raw or dag-cbor)
        #[arg(long, default_value = "raw")]
        codec: String,
    },

    /// Output block bytes to stdout
    Get {
        /// CID of the block
        cid: String,
    },

    /// Write the DAGs under the given roots to an archive
    Export {
        /// Archive to create
        output: PathBuf,

        /// Root CIDs, in header order
        #[arg(required = true)]
        roots: Vec<String>,
    },

    /// Load an archive into the store
    Import {
        /// Archive to read
        input: PathBuf,

        /// Skip checking that the roots resolve after loading
        #[arg(long)]
        no_check: bool,
    },

    /// List an archive's header and block frames
    Ls {
        /// Archive to read
        input: PathBuf,
    },

    /// Check an archive's integrity and in-order DAG layout
    Verify {
        /// Archive to read
        input: PathBuf,
    },

    /// Walk the DAG under the given roots, printing DAG-CBOR nodes
    Walk {
        /// Root CIDs
        #[arg(required = true)]
        roots: Vec<String>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logger(cli.verbose);

    let output = OutputWriter::new(cli.json);

    // Determine store root: CLI arg > CARKIT_ROOT env var > ./carkit-store default
    let root = cli
        .root
        .or_else(|| std::env::var("CARKIT_ROOT").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("./carkit-store"));
    debug!(root = %root.display(), "using store");

    let result = match cli.command {
        Commands::Init { algo } => cmd_init(&root, &algo, &output),
        Commands::Put { path, codec } => cmd_put(&root, path.as_deref(), &codec, &output),
        Commands::Get { cid } => cmd_get(&root, &cid),
        Commands::Export { output: path, roots } => cmd_export(&root, &path, &roots, &output),
        Commands::Import { input, no_check } => cmd_import(&root, &input, no_check, &output),
        Commands::Ls { input } => cmd_ls(&input, &output),
        Commands::Verify { input } => cmd_verify(&input, &output),
        Commands::Walk { roots } => cmd_walk(&root, &roots, &output),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            output.write_error(&err, 1);
            ExitCode::FAILURE
        }
    }
}

/// Log to stderr, filtered by RUST_LOG.
fn setup_logger(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn open_store(root: &Path) -> Result<FsBlockstore> {
    FsBlockstore::open(root).with_context(|| format!("Failed to open store at {}", root.display()))
}

fn parse_roots(roots: &[String]) -> Result<Vec<Cid>> {
    roots
        .iter()
        .map(|s| parse_cid(s).with_context(|| format!("Invalid CID: {}", s)))
        .collect()
}

fn cmd_init(root: &Path, algo: &str, output: &OutputWriter) -> Result<u8> {
    let algorithm = HashAlgorithm::parse(algo)
        .with_context(|| format!("Unsupported algorithm: {}", algo))?;

    FsBlockstore::init(root, algorithm)
        .with_context(|| format!("Failed to initialize store at {}", root.display()))?;

    let data = InitOutput {
        success: true,
        result_code: 0,
        root: root.display().to_string(),
        algorithm: algorithm.as_str().to_string(),
    };
    output.write(&data, || {
        format!(
            "Initialized carkit store at {}\nAlgorithm: {}\n",
            root.display(),
            algorithm.as_str()
        )
    })?;

    Ok(0)
}

fn cmd_put(root: &Path, path: Option<&Path>, codec: &str, output: &OutputWriter) -> Result<u8> {
    let store = open_store(root)?;
    let codec = Codec::parse(codec)?;

    let mut data = Vec::new();
    match path {
        Some(path) => {
            File::open(path)
                .and_then(|mut f| f.read_to_end(&mut data))
                .with_context(|| format!("Failed to read {}", path.display()))?;
        }
        None => {
            io::stdin()
                .read_to_end(&mut data)
                .context("Failed to read stdin")?;
        }
    }

    // Reject bytes that do not decode under the requested codec
    carkit_core::node::decode(codec, &data)
        .with_context(|| format!("Input is not valid {}", codec.as_str()))?;

    let cid = store.put(codec, &data).context("Failed to store block")?;

    let out = PutOutput {
        success: true,
        result_code: 0,
        cid: cid.to_string(),
        codec: codec.as_str().to_string(),
        size: data.len() as u64,
    };
    output.write(&out, || format!("{}\n", cid))?;

    Ok(0)
}

fn cmd_get(root: &Path, cid_str: &str) -> Result<u8> {
    let store = open_store(root)?;
    let cid = parse_cid(cid_str).with_context(|| format!("Invalid CID: {}", cid_str))?;

    let data = store
        .get(&cid)
        .with_context(|| format!("Failed to read block {}", cid))?;

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle.write_all(&data)?;
    handle.flush()?;

    Ok(0)
}

fn cmd_export(root: &Path, path: &Path, roots: &[String], output: &OutputWriter) -> Result<u8> {
    let store = open_store(root)?;
    let roots = parse_roots(roots)?;

    let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let summary = write_car(&store, &roots, BufWriter::new(file))
        .with_context(|| format!("Failed to write archive {}", path.display()))?;

    let out = ExportOutput {
        success: true,
        result_code: 0,
        path: path.display().to_string(),
        roots: cid_strings(&roots),
        blocks: summary.blocks,
        bytes: summary.bytes,
    };
    output.write(&out, || {
        format!(
            "Wrote {} blocks ({} bytes) to {}\n",
            summary.blocks,
            summary.bytes,
            path.display()
        )
    })?;

    Ok(0)
}

fn cmd_import(root: &Path, path: &Path, no_check: bool, output: &OutputWriter) -> Result<u8> {
    let store = open_store(root)?;

    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let roots = load_car(BufReader::new(file), &store)
        .with_context(|| format!("Failed to load archive {}", path.display()))?;

    // The archive may legitimately omit blocks the store already holds
    let (blocks, bytes) = if no_check {
        (0, 0)
    } else {
        let stats = walk_roots(&store, &roots).context("Archive roots do not resolve")?;
        (stats.blocks, stats.bytes)
    };

    let out = ImportOutput {
        success: true,
        result_code: 0,
        path: path.display().to_string(),
        roots: cid_strings(&roots),
        blocks,
        bytes,
    };
    output.write(&out, || {
        let mut text = String::new();
        for (idx, root) in roots.iter().enumerate() {
            text.push_str(&format!("{} header root {}: {}\n", path.display(), idx + 1, root));
        }
        if !no_check {
            text.push_str(&format!("Resolved {} blocks ({} bytes)\n", blocks, bytes));
        }
        text
    })?;

    Ok(0)
}

fn cmd_ls(path: &Path, output: &OutputWriter) -> Result<u8> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut reader = CarReader::new(file)
        .with_context(|| format!("Failed to read archive {}", path.display()))?;

    let mut entries = Vec::new();
    while let Some(entry) = reader
        .next_entry()
        .with_context(|| format!("Failed to read archive {}", path.display()))?
    {
        entries.push(EntryInfo {
            offset: entry.offset,
            cid: entry.block.cid.to_string(),
            codec: codec_name(&entry.block.cid),
            size: entry.block.data.len() as u64,
        });
    }

    let out = LsOutput {
        success: true,
        result_code: 0,
        version: reader.header().version,
        roots: cid_strings(reader.roots()),
        entries,
    };
    output.write(&out, || {
        let mut text = format!("version {}\n", out.version);
        for root in &out.roots {
            text.push_str(&format!("root {}\n", root));
        }
        for entry in &out.entries {
            text.push_str(&format!(
                "{:>10} {} {:<8} {}\n",
                entry.offset, entry.cid, entry.codec, entry.size
            ));
        }
        text
    })?;

    Ok(0)
}

fn cmd_verify(path: &Path, output: &OutputWriter) -> Result<u8> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let report = verify_car(BufReader::new(file))
        .with_context(|| format!("Archive {} failed verification", path.display()))?;

    let complete = report.is_complete();
    let result_code = if complete { 0 } else { 2 };

    let out = VerifyOutput {
        success: complete,
        result_code,
        roots: cid_strings(&report.roots),
        blocks: report.blocks,
        bytes: report.bytes,
        complete,
        missing: cid_strings(&report.missing),
    };
    output.write(&out, || {
        let mut text = format!(
            "{} blocks, {} bytes, {} roots\n",
            report.blocks,
            report.bytes,
            report.roots.len()
        );
        if complete {
            text.push_str("OK\n");
        } else {
            for cid in &report.missing {
                text.push_str(&format!("missing {}\n", cid));
            }
        }
        text
    })?;

    Ok(result_code)
}

fn cmd_walk(root: &Path, roots: &[String], output: &OutputWriter) -> Result<u8> {
    let store = open_store(root)?;
    let roots = parse_roots(roots)?;

    let mut blocks = Vec::new();
    for block in DagWalker::new(&store, roots.iter().copied()) {
        let block = block.context("DAG walk failed")?;
        let links = block.links()?;
        // Raw payloads are not rendered
        let node = match Codec::of(&block.cid) {
            Ok(Codec::DagCbor) => Some(describe_node(&block.decode()?)),
            _ => None,
        };

        blocks.push(WalkedBlock {
            cid: block.cid.to_string(),
            codec: codec_name(&block.cid),
            size: block.data.len() as u64,
            links: cid_strings(&links),
            node,
        });
    }

    let out = WalkOutput {
        success: true,
        result_code: 0,
        roots: cid_strings(&roots),
        blocks,
    };
    output.write(&out, || {
        let mut text = String::new();
        for block in &out.blocks {
            text.push_str(&format!("{} {} {} bytes\n", block.cid, block.codec, block.size));
            if let Some(node) = &block.node {
                text.push_str(&format!("\t{}\n", node));
            }
        }
        text
    })?;

    Ok(0)
}

/// One-line rendering of a node; links are shown as their CID string.
fn describe_node(node: &Ipld) -> String {
    enum Piece<'a> {
        Node(&'a Ipld),
        Text(String),
    }

    let mut out = String::new();
    let mut stack = vec![Piece::Node(node)];

    while let Some(piece) = stack.pop() {
        let node = match piece {
            Piece::Text(text) => {
                out.push_str(&text);
                continue;
            }
            Piece::Node(node) => node,
        };

        match node {
            Ipld::Null => out.push_str("null"),
            Ipld::Bool(b) => out.push_str(&b.to_string()),
            Ipld::Integer(i) => out.push_str(&i.to_string()),
            Ipld::Float(f) => out.push_str(&f.to_string()),
            Ipld::String(s) => out.push_str(&format!("{:?}", s)),
            Ipld::Bytes(b) => out.push_str(&format!("<{} bytes>", b.len())),
            Ipld::Link(cid) => out.push_str(&format!("&{}", cid)),
            Ipld::List(items) => {
                out.push('[');
                stack.push(Piece::Text("]".to_string()));
                // Reversed so the first item pops first
                for (idx, item) in items.iter().enumerate().rev() {
                    stack.push(Piece::Node(item));
                    if idx > 0 {
                        stack.push(Piece::Text(", ".to_string()));
                    }
                }
            }
            Ipld::Map(map) => {
                out.push('{');
                stack.push(Piece::Text("}".to_string()));
                for (idx, (key, value)) in map.iter().enumerate().rev() {
                    stack.push(Piece::Node(value));
                    let sep = if idx > 0 { ", " } else { "" };
                    stack.push(Piece::Text(format!("{}{}: ", sep, key)));
                }
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_cli_parses() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_roots() {
        let cid = carkit_core::compute_cid(Codec::Raw, HashAlgorithm::Sha2_256, b"x");
        assert_eq!(parse_roots(&[cid.to_string()]).unwrap(), vec![cid]);
        assert!(parse_roots(&["nope".to_string()]).is_err());
    }

    #[test]
    fn test_describe_node() {
        let cid = carkit_core::compute_cid(Codec::Raw, HashAlgorithm::Sha2_256, b"x");
        let mut map = BTreeMap::new();
        map.insert("number".to_string(), Ipld::String("two".into()));
        map.insert("previous".to_string(), Ipld::Link(cid));
        map.insert("tags".to_string(), Ipld::List(vec![Ipld::Integer(1), Ipld::Null]));

        assert_eq!(
            describe_node(&Ipld::Map(map)),
            format!("{{number: \"two\", previous: &{}, tags: [1, null]}}", cid)
        );
    }

    #[test]
    fn test_describe_deeply_nested_node() {
        let mut node = Ipld::Integer(7);
        for _ in 0..100_000 {
            node = Ipld::List(vec![node]);
        }

        let text = describe_node(&node);
        assert_eq!(text.len(), 200_001);
        assert!(text.starts_with("[[[") && text.ends_with("7]]]"));

        // Unwind without recursive drop
        let mut stack = vec![node];
        while let Some(node) = stack.pop() {
            if let Ipld::List(items) = node {
                stack.extend(items);
            }
        }
    }

    #[test]
    fn test_describe_empty_containers() {
        let node = Ipld::List(vec![Ipld::List(vec![]), Ipld::Map(BTreeMap::new())]);
        assert_eq!(describe_node(&node), "[[], {}]");
    }

    #[test]
    fn test_export_import_through_commands() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let src_root = temp_dir.path().join("in");
        let dst_root = temp_dir.path().join("out");
        let car_path = temp_dir.path().join("example.car");
        let output = OutputWriter::new(true);

        cmd_init(&src_root, "sha2-256", &output).unwrap();
        cmd_init(&dst_root, "blake3", &output).unwrap();

        let src = FsBlockstore::open(&src_root).unwrap();
        let leaf = src.put(Codec::Raw, b"leaf").unwrap();
        let mut map = BTreeMap::new();
        map.insert("child".to_string(), Ipld::Link(leaf));
        let root = src.put_node(Codec::DagCbor, &Ipld::Map(map)).unwrap();

        cmd_export(&src_root, &car_path, &[root.to_string()], &output).unwrap();
        assert_eq!(cmd_verify(&car_path, &output).unwrap(), 0);
        cmd_import(&dst_root, &car_path, false, &output).unwrap();

        let dst = FsBlockstore::open(&dst_root).unwrap();
        assert_eq!(dst.get(&leaf).unwrap(), b"leaf");
        assert_eq!(walk_roots(&dst, &[root]).unwrap().blocks, 2);
    }
}
