//! A dataset I/O plugin framework for scientific imaging file formats.
//!
//! `voxio` ingests heterogeneous scientific-imaging files (raw binary volumes,
//! [MetaImage](https://itk.org/Wiki/ITK/MetaIO/Documentation) volumes, mesh and graph files,
//! project bundles) and exposes their contents as one of a small set of in-memory
//! [`DataSet`](dataset::DataSet) kinds for consumption by downstream visualization and
//! processing code.
//!
//! The crate is organised around four load-bearing pieces:
//!  - the [file type registry](io::registry), a process-wide catalog mapping file extensions to
//!    [`FileIo`](io::FileIo) plugin implementations,
//!  - the [attribute system](attributes), a typed, bounded parameter model used to configure
//!    loads and saves,
//!  - [numeric type dispatch](dispatch), which selects a concrete pixel-type specialization of a
//!    generic function from runtime scalar-type and pixel-layout tags,
//!  - the [representation bridge](bridge), which lazily keeps the two in-memory image
//!    representations of a volume consistent, with cached conversions invalidated on mutation.
//!
//! ## Example
//! ```rust,no_run
//! use voxio::io::{registry, Operation};
//! use voxio::progress::Progress;
//!
//! registry::setup_default_file_types();
//!
//! let io = registry::create_io("chamber.mhd".as_ref(), Operation::Load)?;
//! let data_set = io.load(
//!     "chamber.mhd".as_ref(),
//!     &voxio::attributes::ValueMap::new(),
//!     &Progress::none(),
//! )?;
//! println!("{}", data_set.info());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Failure behaviour
//! All fallible operations return explicit [`Result`]s with typed errors; registration
//! conflicts and missing optional parameters degrade to defaults with a logged warning
//! (via the [`log`] facade) instead of failing the operation.

#![warn(unused_variables)]
#![warn(dead_code)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![deny(clippy::missing_panics_doc)]

pub mod attributes;
pub mod bridge;
pub mod dataset;
pub mod dispatch;
pub mod io;
pub mod progress;
