use std::sync::Arc;

/// Raw view over the contents of an input or expected-output buffer.
pub trait BufferInterface {
    fn num_bytes(&self) -> usize {
        self.data().len()
    }

    fn data(&self) -> &[u8];
}

pub type BufferSp = Arc<dyn BufferInterface + Send + Sync>;

/// A buffer of plain-old-data elements, laid out exactly as the shader sees them.
#[derive(Debug, Clone, PartialEq)]
pub struct Buffer<T: bytemuck::Pod> {
    elements: Vec<T>,
}

pub type Float32Buffer = Buffer<f32>;
pub type Int32Buffer = Buffer<i32>;
pub type Uint32Buffer = Buffer<u32>;

impl<T: bytemuck::Pod> Buffer<T> {
    pub fn new(elements: Vec<T>) -> Self {
        Self { elements }
    }

    pub fn elements(&self) -> &[T] {
        &self.elements
    }

    /// Wraps the buffer for use in a [`ComputeShaderSpec`].
    pub fn into_shared(self) -> BufferSp
    where
        T: Send + Sync + 'static,
    {
        Arc::new(self)
    }
}

impl<T: bytemuck::Pod> BufferInterface for Buffer<T> {
    fn data(&self) -> &[u8] {
        bytemuck::cast_slice(&self.elements)
    }
}

impl BufferInterface for Vec<u8> {
    fn data(&self) -> &[u8] {
        self
    }
}

/// Everything needed to run one compute shader test: the SPIR-V assembly, the
/// input buffers bound first, the expected output buffers bound after them, and
/// the work group counts of the single dispatch.
#[derive(Clone)]
pub struct ComputeShaderSpec {
    pub assembly: String,
    pub inputs: Vec<BufferSp>,
    pub outputs: Vec<BufferSp>,
    pub num_work_groups: [u32; 3],
    pub entry_point: String,
}

impl ComputeShaderSpec {
    pub fn new(assembly: impl Into<String>) -> Self {
        Self {
            assembly: assembly.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            num_work_groups: [1, 1, 1],
            entry_point: "main".to_owned(),
        }
    }

    pub fn with_input(mut self, buffer: BufferSp) -> Self {
        self.inputs.push(buffer);
        self
    }

    pub fn with_output(mut self, buffer: BufferSp) -> Self {
        self.outputs.push(buffer);
        self
    }

    pub fn with_work_groups(mut self, num_work_groups: [u32; 3]) -> Self {
        self.num_work_groups = num_work_groups;
        self
    }

    pub fn with_entry_point(mut self, entry_point: impl Into<String>) -> Self {
        self.entry_point = entry_point.into();
        self
    }

    pub fn num_buffers(&self) -> usize {
        self.inputs.len() + self.outputs.len()
    }

    /// Inputs followed by outputs, in binding order.
    pub fn buffers(&self) -> impl Iterator<Item = &BufferSp> {
        self.inputs.iter().chain(&self.outputs)
    }
}

impl std::fmt::Debug for ComputeShaderSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sizes = |buffers: &[BufferSp]| buffers.iter().map(|b| b.num_bytes()).collect::<Vec<_>>();
        f.debug_struct("ComputeShaderSpec")
            .field("entry_point", &self.entry_point)
            .field("inputs", &sizes(&self.inputs))
            .field("outputs", &sizes(&self.outputs))
            .field("num_work_groups", &self.num_work_groups)
            .finish_non_exhaustive()
    }
}
