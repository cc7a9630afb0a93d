use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{bail, Context};
use keepscope::{
    classfile::peek_name,
    config::AgentConfig,
    instrument::{EntryProbeRewriter, ProbeTarget},
    registry::UsageRegistry,
    transformer::{LoadRequest, LoadTimeTransformer, Outcome},
};
use log::{debug, info, warn};
use rayon::prelude::*;
use serde::Serialize;

use crate::{
    app::GlobalOptions,
    commands::common::{collect_classes, is_class_file},
    output::print_output,
};

pub struct InstrumentOptions<'a> {
    pub ignore: Option<&'a str>,
    pub probe: Option<&'a str>,
    pub global: &'a GlobalOptions,
}

#[derive(Debug, Serialize)]
pub struct InstrumentReport {
    pub files: usize,
    pub instrumented: u64,
    pub probes: usize,
    pub ignored: u64,
    pub interfaces: u64,
    pub failed: u64,
    pub fully_retained: Vec<String>,
}

pub fn run(input: &Path, output: &Path, opts: &InstrumentOptions<'_>) -> anyhow::Result<()> {
    let mut config = AgentConfig::default().with_debug(opts.global.verbose);
    if let Some(rules) = opts.ignore {
        config = config.with_ignored_prefixes(rules.split(',').map(str::trim));
    }
    if let Some(probe) = opts.probe {
        config = config.with_probe(parse_probe(probe)?);
    }

    let jobs = plan(input, output)?;
    let registry = Arc::new(UsageRegistry::new());
    let transformer = LoadTimeTransformer::new(
        Arc::clone(&registry),
        config.ignore_filter(),
        Box::new(EntryProbeRewriter::new(config.probe.clone())),
        config.debug,
    );

    let probes: usize = jobs
        .par_iter()
        .map(|(source, target)| instrument_file(&transformer, source, target))
        .collect::<anyhow::Result<Vec<usize>>>()?
        .into_iter()
        .sum();

    let stats = transformer.stats();
    let report = InstrumentReport {
        files: jobs.len(),
        instrumented: stats.instrumented,
        probes,
        ignored: stats.ignored,
        interfaces: stats.interfaces,
        failed: stats.failed,
        fully_retained: registry.snapshot().full_units.into_iter().collect(),
    };

    print_output(&report, opts.global, |report| {
        info!(
            "{} files: {} instrumented ({} probes), {} ignored, {} interfaces, {} failed",
            report.files,
            report.instrumented,
            report.probes,
            report.ignored,
            report.interfaces,
            report.failed
        );
        for unit in &report.fully_retained {
            println!("keep whole: {unit}");
        }
    })
}

/// Pair every input class file with its output location.
fn plan(input: &Path, output: &Path) -> anyhow::Result<Vec<(PathBuf, PathBuf)>> {
    if input.is_dir() {
        collect_classes(input)?
            .into_iter()
            .map(|source| -> anyhow::Result<(PathBuf, PathBuf)> {
                let relative = source.strip_prefix(input)?.to_path_buf();
                Ok((source, output.join(relative)))
            })
            .collect()
    } else if is_class_file(input) {
        Ok(vec![(input.to_path_buf(), output.to_path_buf())])
    } else {
        bail!("not a .class file or directory: {}", input.display())
    }
}

/// Rewrite one file; uninstrumentable units are copied unchanged.
fn instrument_file(
    transformer: &LoadTimeTransformer,
    source: &Path,
    target: &Path,
) -> anyhow::Result<usize> {
    let bytes =
        std::fs::read(source).with_context(|| format!("failed to read: {}", source.display()))?;

    // Fall back to the file stem so unparseable files still get a fully-retained entry
    let name = peek_name(&bytes).unwrap_or_else(|_| {
        source
            .file_stem()
            .map_or_else(String::new, |stem| stem.to_string_lossy().to_string())
    });

    let outcome = transformer.process(&LoadRequest::new(&name, &bytes));
    let (written, probes) = match outcome {
        Outcome::Instrumented { bytes, probes } => {
            debug!("{name}: {probes} probes");
            (bytes, probes)
        }
        Outcome::Failed(error) => {
            warn!("{}: copied unmodified ({error})", source.display());
            (bytes, 0)
        }
        Outcome::Ignored | Outcome::Interface | Outcome::Detached => (bytes, 0),
    };

    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory: {}", parent.display()))?;
    }
    std::fs::write(target, written)
        .with_context(|| format!("failed to write: {}", target.display()))?;
    Ok(probes)
}

/// Parse `owner.Class#method` into a probe target.
fn parse_probe(spec: &str) -> anyhow::Result<ProbeTarget> {
    match spec.split_once('#') {
        Some((owner, method)) if !owner.is_empty() && !method.is_empty() => {
            Ok(ProbeTarget::new(owner, method))
        }
        _ => bail!("probe must be given as owner.Class#method, got: {spec}"),
    }
}

#[cfg(test)]
mod tests {
    use keepscope::classfile::{
        code::CodeAttribute,
        flags::{ClassAccessFlags, MethodAccessFlags},
        ClassFile,
    };

    use super::*;

    fn write_class(path: &Path, name: &str) {
        let mut class =
            ClassFile::new(name, "java/lang/Object", ClassAccessFlags::PUBLIC).unwrap();
        class
            .add_method(
                MethodAccessFlags::PUBLIC,
                "baz",
                "()V",
                Some(CodeAttribute::new(0, 1, vec![0xB1])),
            )
            .unwrap();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, class.to_bytes().unwrap()).unwrap();
    }

    #[test]
    fn probe_spec_parsing() {
        let probe = parse_probe("org.example.Bridge#hit").unwrap();
        assert_eq!(probe.owner(), "org/example/Bridge");
        assert_eq!(probe.method(), "hit");
        assert!(parse_probe("org.example.Bridge").is_err());
        assert!(parse_probe("#hit").is_err());
    }

    #[test]
    fn directory_layout_is_mirrored() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        write_class(&input.path().join("com/foo/Bar.class"), "com/foo/Bar");
        write_class(&input.path().join("sun/misc/Unsafe.class"), "sun/misc/Unsafe");
        std::fs::write(input.path().join("com/Broken.class"), b"\xCA\xFE").unwrap();

        let jobs = plan(input.path(), output.path()).unwrap();
        assert_eq!(jobs.len(), 3);

        let registry = Arc::new(UsageRegistry::new());
        let transformer = LoadTimeTransformer::new(
            Arc::clone(&registry),
            AgentConfig::default().ignore_filter(),
            Box::new(EntryProbeRewriter::default()),
            false,
        );
        let probes: usize = jobs
            .iter()
            .map(|(source, target)| instrument_file(&transformer, source, target).unwrap())
            .sum();

        assert_eq!(probes, 1);
        assert!(output.path().join("com/foo/Bar.class").exists());
        assert_eq!(
            std::fs::read(output.path().join("com/Broken.class")).unwrap(),
            b"\xCA\xFE"
        );
        assert!(registry.is_fully_used("sun.misc.Unsafe"));
        assert!(registry.is_fully_used("Broken"));
        assert_eq!(transformer.stats().failed, 1);
    }

    #[test]
    fn rejects_non_class_input() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("notes.txt");
        std::fs::write(&file, b"").unwrap();
        assert!(plan(&file, dir.path()).is_err());
    }
}
