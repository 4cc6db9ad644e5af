//! Command-line driver for the `mipmem` crate.

use std::path::{Path, PathBuf};

use mipmem::allocation::Allocation;
use mipmem::context::Context;
use mipmem::error::AllocationError;
use mipmem::gpu::render_context::RenderContext;
use mipmem::gpu::wgpu_backend::WgpuBackend;
use mipmem::options::Options;
use mipmem::stream::IStream;

struct Args {
    input: PathBuf,
    upload: bool,
    options: Option<PathBuf>,
}

fn parse_args() -> Result<Args, String> {
    let mut input = None;
    let mut upload = false;
    let mut options = None;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--upload" => upload = true,
            "--options" => {
                let path = args
                    .next()
                    .ok_or_else(|| "--options needs a path".to_owned())?;
                options = Some(PathBuf::from(path));
            }
            flag if flag.starts_with("--") => {
                return Err(format!("unknown flag {flag}"));
            }
            path if input.is_none() => input = Some(PathBuf::from(path)),
            extra => return Err(format!("unexpected argument {extra}")),
        }
    }

    Ok(Args {
        input: input.ok_or_else(|| "missing input file".to_owned())?,
        upload,
        options,
    })
}

fn load_all(
    ctx: &Context,
    path: &Path,
) -> Result<Vec<Allocation>, AllocationError> {
    let bytes = std::fs::read(path)?;
    let mut input = IStream::new(&bytes);
    let mut allocations = Vec::new();
    while !input.is_empty() {
        allocations.push(Allocation::deserialize(ctx, &mut input)?);
    }
    Ok(allocations)
}

fn schedule(ctx: &Context, alloc: &mut Allocation) -> bool {
    let scheduled = if alloc.ty().element().pixel_format().is_some()
        && !alloc.ty().is_1d()
    {
        alloc.mark_for_texture_upload(ctx, true, 0)
    } else if alloc.ty().is_1d() {
        alloc.mark_for_buffer_upload(ctx)
    } else {
        log::warn!("{}: nothing to upload to", alloc.name());
        return false;
    };
    scheduled.is_ok()
}

fn upload(ctx: &Context, allocations: &mut [Allocation]) {
    let context = match pollster::block_on(RenderContext::new_headless()) {
        Ok(context) => context,
        Err(e) => {
            log::error!("{e}");
            std::process::exit(1);
        }
    };
    let mut backend = WgpuBackend::new(context);

    for alloc in allocations.iter_mut() {
        if !schedule(ctx, alloc) {
            continue;
        }
        match alloc.sync_pending(ctx, &mut backend) {
            Ok(outcome) => log::info!("{}: {outcome:?}", alloc.name()),
            Err(e) => log::error!("{}: {e}", alloc.name()),
        }
    }
    backend.context().submit();

    for alloc in allocations {
        alloc.release_gpu_resources(&mut backend);
    }
}

fn main() {
    env_logger::init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            log::error!("{e}");
            log::error!(
                "Usage: mipmem <file> [--upload] [--options <options.toml>]"
            );
            std::process::exit(1);
        }
    };

    let options = match &args.options {
        Some(path) => match Options::load(path) {
            Ok(options) => options,
            Err(e) => {
                log::error!("{}: {e}", path.display());
                std::process::exit(1);
            }
        },
        None => Options::default(),
    };
    let ctx = Context::new(options);

    let mut allocations = match load_all(&ctx, &args.input) {
        Ok(allocations) => allocations,
        Err(e) => {
            log::error!("{}: {e}", args.input.display());
            std::process::exit(1);
        }
    };

    for alloc in &allocations {
        log::info!("{} {}", alloc.name(), alloc.ty());
        alloc.dump("  ");
    }

    if args.upload {
        upload(&ctx, &mut allocations);
    }
    ctx.dump_debug();
}
