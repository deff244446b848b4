//! Downstream sinks.
//!
//! The engine hands every output element to a [`Sink`] synchronously. There is
//! no acknowledgement and no buffering on the engine side.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::types::{Element, VersionedEdge, VersionedVertex};

/// Next stage in the filter chain.
pub trait Sink {
    /// Receive one output element.
    fn emit(&mut self, element: Element);
}

impl<F: FnMut(Element)> Sink for F {
    fn emit(&mut self, element: Element) {
        self(element)
    }
}

/// Sink that keeps every element in order.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    elements: Vec<Element>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything emitted so far.
    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    /// Emitted vertices, in order.
    pub fn vertices(&self) -> Vec<&VersionedVertex> {
        self.elements.iter().filter_map(Element::as_vertex).collect()
    }

    /// Emitted edges, in order.
    pub fn edges(&self) -> Vec<&VersionedEdge> {
        self.elements.iter().filter_map(Element::as_edge).collect()
    }

    /// Take the elements, leaving the sink empty.
    pub fn drain(&mut self) -> Vec<Element> {
        std::mem::take(&mut self.elements)
    }

    /// Number of elements emitted.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Whether nothing was emitted.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

impl Sink for MemorySink {
    fn emit(&mut self, element: Element) {
        self.elements.push(element);
    }
}

/// Cloneable handle onto a shared element buffer.
///
/// Lets a caller keep reading what an engine emitted while the engine owns
/// its own clone of the handle.
#[derive(Debug, Clone, Default)]
pub struct SharedSink {
    inner: Arc<Mutex<Vec<Element>>>,
}

impl SharedSink {
    /// Create an empty shared sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything emitted so far.
    pub fn snapshot(&self) -> Vec<Element> {
        self.inner.lock().clone()
    }

    /// Take the elements, leaving the buffer empty.
    pub fn drain(&self) -> Vec<Element> {
        std::mem::take(&mut *self.inner.lock())
    }

    /// Number of elements emitted.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Whether nothing was emitted.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

impl Sink for SharedSink {
    fn emit(&mut self, element: Element) {
        self.inner.lock().push(element);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Vertex, VertexIdentity};

    fn element(version: u64) -> Element {
        let base = Vertex::new().with("pid", "1");
        Element::Vertex(VersionedVertex::new(
            VertexIdentity::from_bytes([9; 16]),
            version,
            &base,
            "version",
        ))
    }

    #[test]
    fn test_memory_sink_keeps_order() {
        let mut sink = MemorySink::new();
        sink.emit(element(0));
        sink.emit(element(1));
        let versions: Vec<u64> = sink.vertices().iter().map(|v| v.version).collect();
        assert_eq!(versions, vec![0, 1]);
        assert!(sink.edges().is_empty());
    }

    #[test]
    fn test_shared_sink_clones_share_buffer() {
        let reader = SharedSink::new();
        let mut writer = reader.clone();
        writer.emit(element(0));
        assert_eq!(reader.len(), 1);
        assert_eq!(reader.drain().len(), 1);
        assert!(writer.is_empty());
    }

    #[test]
    fn test_closure_sink() {
        let mut count = 0;
        {
            let mut sink = |_: Element| count += 1;
            sink.emit(element(0));
            sink.emit(element(1));
        }
        assert_eq!(count, 2);
    }
}
