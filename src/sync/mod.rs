mod handoff;

pub(crate) use handoff::Handoff;
