pub mod bundle;
pub mod casing;
pub mod codespace;
pub mod config;
pub mod emit;
pub mod error;
pub mod features;
pub mod table;

use tracing::info;

use crate::bundle::Bundle;
use crate::codespace::Codespace;
use crate::config::{Config, Endian, OptimizeFor};
use crate::emit::Fragment;
use crate::error::Error;
use crate::features::Context;

/// The Unicode Character Database revision the data bundle is built from.
pub const UNICODE_VERSION: &str = "16.0.0";

/// The three generated artifacts: table definitions for the runtime's
/// private source file, declarations for its private header, and the
/// feature/platform surface for its public header.
pub struct Artifacts {
    pub source: String,
    pub header: String,
    pub public_header: String,
}

/// Runs one full generation: resolves the requested features, drives
/// them through the three phases against a fresh codespace, compacts the
/// result into the two-stage tables, and assembles the output text.
pub fn generate(config: &Config, bundle: &mut Bundle) -> Result<Artifacts, Error> {
    let mut out = Fragment::default();

    out.public_header.push_str("#include <stdint.h>\n");
    match config.endian {
        Endian::Big => out.public_header.push_str("#define UNI_BIG_ENDIAN\n"),
        Endian::Little => out.public_header.push_str("#define UNI_LITTLE_ENDIAN\n"),
    }
    out.public_header.push_str(&format!(
        "#define UNI_STACK_BUFFER_SIZE {}\n",
        config.stack_buffer_size
    ));
    out.public_header
        .push_str(&format!("typedef {} unichar;\n", config.character_storage));
    if config.has_malloc {
        out.public_header
            .push_str("#define UNI_HAVE_C_MEMORY_ROUTINES\n");
    }

    let mut version = UNICODE_VERSION.split('.');
    out.header.push_str(&format!(
        "#define UNICODE_VERSION_MAJOR {}\n",
        version.next().unwrap_or("0")
    ));
    out.header.push_str(&format!(
        "#define UNICODE_VERSION_MINOR {}\n",
        version.next().unwrap_or("0")
    ));
    out.header.push_str(&format!(
        "#define UNICODE_VERSION_PATCH {}\n",
        version.next().unwrap_or("0")
    ));
    match config.optimize {
        OptimizeFor::Speed => out.header.push_str("#define UNI_OPTIMIZE_FOR_SPEED\n"),
        OptimizeFor::Size => out.header.push_str("#define UNI_OPTIMIZE_FOR_SIZE\n"),
    }

    let order = features::resolve(&config.requested_features())?;

    let mut space = Codespace::new();
    let mut ctx = Context::default();
    let (fragment, sizes) = features::run(&order, bundle, config, &mut space, &mut ctx)?;
    let mut total_size = fragment.size;
    out.append(fragment);

    let tables = table::compile(&mut space, "CodepointData", "uni_codepoint_data")?;
    for entry in &sizes {
        if entry.size > 0 {
            info!(
                "Added: {} ({:.2} kB)",
                entry.name,
                entry.size as f64 / 1024.0
            );
        } else {
            info!("Added: {}", entry.name);
        }
    }
    info!("Character table size: ({:.2} kB)", tables.size as f64 / 1024.0);
    total_size += tables.size;
    info!("Total size: {:.2} kB", total_size as f64 / 1024.0);

    out.source.push_str(&tables.source);
    out.header.push_str(&tables.header);

    Ok(Artifacts {
        source: emit::strip_blank_lines(&out.source),
        header: emit::strip_blank_lines(&out.header),
        public_header: emit::strip_blank_lines(&out.public_header),
    })
}
