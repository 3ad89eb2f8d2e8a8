// src/nodes/mod.rs

//! Built-in module types.
//!
//! | type | roles |
//! |---|---|
//! | `param` | [`Params`](crate::module::Params) |
//! | `linear` | array output |
//! | `id`, `relu`, `tanh`, `logistic` | array output |
//! | `input-memory` | [`Input`](crate::module::Input), [`LabelSource`](crate::module::LabelSource) |
//! | `regression` | [`Loss`](crate::module::Loss) |
//! | `monitor` | [`Stat`](crate::module::Stat) |

pub mod activation;
pub mod input;
pub mod linear;
pub mod monitor;
pub mod param;
pub mod regression;

use crate::module::{BuildModule, Constructor, into_ref};

pub use activation::{Activation, FunctionModule};
pub use input::InputMemory;
pub use linear::Linear;
pub use monitor::Monitor;
pub use param::ParamModule;
pub use regression::Regression;

/// Type names and constructors of every built-in module.
pub fn builtins() -> Vec<(&'static str, Constructor)> {
    vec![
        ("param", constructor::<ParamModule>()),
        ("linear", constructor::<Linear>()),
        ("id", function(Activation::Identity)),
        ("relu", function(Activation::Relu)),
        ("tanh", function(Activation::Tanh)),
        ("logistic", function(Activation::Logistic)),
        ("input-memory", constructor::<InputMemory>()),
        ("regression", constructor::<Regression>()),
        ("monitor", constructor::<Monitor>()),
    ]
}

fn constructor<M: BuildModule>() -> Constructor {
    Box::new(|ctx| Ok(into_ref(M::build(ctx)?)))
}

fn function(activation: Activation) -> Constructor {
    Box::new(move |ctx| Ok(into_ref(FunctionModule::build_with(ctx, activation)?)))
}
