//! Splits a flat config string into module and pin parameter groups.

use log::{error, info};
use smallvec::SmallVec;

/// Result of splitting one flat config string.
///
/// Each group is the original comma-joined substring; pin groups begin with
/// the delimiter token that opened them. Groups parse into key-value form
/// with `pin_fabric::KvConfig::parse`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConfigGroups {
    /// Tokens before the first delimiter: the module's own parameters.
    pub module: String,
    /// One group per `in_type=` delimiter, in order of appearance.
    pub inputs: SmallVec<[String; 4]>,
    /// One group per `out_type=` delimiter, in order of appearance.
    pub outputs: SmallVec<[String; 4]>,
}

#[derive(Clone, Copy)]
enum Active {
    Module,
    Input,
    Output,
}

/// Splits `raw` on `,` into module/input/output parameter groups.
///
/// `in_type=` and `out_type=` tokens open a new group of their polarity and
/// are included in it; every other token appends to the group opened most
/// recently. The module group is active from the start, so a token can
/// never lack a target. Empty tokens are skipped with an info log and
/// tokens that do not split on `=` into exactly two parts are skipped with
/// an error log, mirroring the key-value parser's rules.
pub fn split_pin_groups(raw: &str) -> ConfigGroups {
    let mut module: Vec<&str> = Vec::new();
    let mut inputs: SmallVec<[Vec<&str>; 4]> = SmallVec::new();
    let mut outputs: SmallVec<[Vec<&str>; 4]> = SmallVec::new();
    let mut active = Active::Module;

    for token in raw.split(',') {
        if token.is_empty() {
            info!("skipping empty config token");
            continue;
        }
        let mut parts = token.split('=');
        let key = match (parts.next(), parts.next(), parts.next()) {
            (Some(key), Some(_), None) if !key.is_empty() => key,
            _ => {
                error!("malformed config token '{token}', expected key=value");
                continue;
            }
        };

        match key {
            "in_type" => {
                inputs.push(vec![token]);
                active = Active::Input;
            }
            "out_type" => {
                outputs.push(vec![token]);
                active = Active::Output;
            }
            _ => match active {
                Active::Module => module.push(token),
                Active::Input => inputs
                    .last_mut()
                    .expect("input delimiter opened this group")
                    .push(token),
                Active::Output => outputs
                    .last_mut()
                    .expect("output delimiter opened this group")
                    .push(token),
            },
        }
    }

    ConfigGroups {
        module: module.join(","),
        inputs: inputs.iter().map(|group| group.join(",")).collect(),
        outputs: outputs.iter().map(|group| group.join(",")).collect(),
    }
}
