//! Parameter-error remap table (§4.5 step 3, C5).
//!
//! On a 4xx transformer response that names a specific bad parameter, the
//! dispatcher strips the offending option and retries once rather than
//! surfacing the error straight to the client. The table is closed and
//! small: an implementer extends it as new transformer-specific codes are
//! observed, never by accepting arbitrary codes as retriable.

use crate::cache::key::TransformOptions;

/// Strip the option(s) a given transformer status code names as invalid.
/// Returns `true` if anything was cleared (signalling the dispatcher
/// should retry once), `false` if the status isn't in the remap table or
/// nothing was left to clear.
pub fn strip_offending_params(status: u16, options: &mut TransformOptions) -> bool {
    let mut changed = false;
    match status {
        // Unprocessable dimensions: drop explicit width/height/responsive
        // hints and let the transformer fall back to source dimensions.
        422 => {
            changed |= take(&mut options.width);
            changed |= take(&mut options.height);
            changed |= take(&mut options.imwidth);
            changed |= take(&mut options.imheight);
        }
        // Unsupported quality/compression combination.
        400 => {
            changed |= take(&mut options.quality);
            changed |= take(&mut options.compression);
        }
        // Unsupported output format: fall back to the source's own format.
        415 => {
            changed |= take(&mut options.format);
        }
        _ => {}
    }
    changed
}

fn take<T>(opt: &mut Option<T>) -> bool {
    opt.take().is_some()
}
