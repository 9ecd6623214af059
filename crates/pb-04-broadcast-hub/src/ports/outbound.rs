//! # Outbound Ports (Driven Ports / SPI)
//!
//! The observer transport as seen by the pumps: a sink of outgoing frames
//! and a stream of incoming ones, both reporting failures as [`HubError`].

use crate::domain::errors::HubError;
use crate::domain::frame::Frame;
use futures::{Sink, Stream};

pub trait FrameSink: Sink<Frame, Error = HubError> + Unpin + Send {}

impl<T> FrameSink for T where T: Sink<Frame, Error = HubError> + Unpin + Send {}

pub trait FrameStream: Stream<Item = Result<Frame, HubError>> + Unpin + Send {}

impl<T> FrameStream for T where T: Stream<Item = Result<Frame, HubError>> + Unpin + Send {}
