pub mod chimera;
pub mod extender;
