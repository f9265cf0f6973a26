// Application layer: concrete pipelines wired from domain ports and core steps.

pub mod pipelines;
