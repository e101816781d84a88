use crate::error::HarnessError;
use ash::vk;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// Harness-wide settings, shared by every test case in a run.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Index into the instance's physical device list.
    pub device_index: usize,
    /// Vulkan API version requested at instance creation, e.g. `"1.0"`.
    pub api_version: String,
    /// `spirv-tools` target environment used to assemble and validate shaders.
    pub target_env: String,
    /// Run the SPIR-V validator on every assembled program.
    pub validate: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            device_index: 0,
            api_version: "1.0".to_owned(),
            target_env: "vulkan1.0".to_owned(),
            validate: true,
        }
    }
}

impl HarnessConfig {
    pub fn from_path<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        let config = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn vk_api_version(&self) -> Result<u32, HarnessError> {
        Ok(match self.api_version.as_str() {
            "1.0" => vk::API_VERSION_1_0,
            "1.1" => vk::API_VERSION_1_1,
            "1.2" => vk::API_VERSION_1_2,
            "1.3" => vk::API_VERSION_1_3,
            other => {
                return Err(HarnessError::UnknownSetting {
                    kind: "Vulkan API version",
                    value: other.to_owned(),
                });
            }
        })
    }

    pub fn spirv_target_env(&self) -> Result<spirv_tools::TargetEnv, HarnessError> {
        use spirv_tools::TargetEnv;
        Ok(match self.target_env.as_str() {
            "vulkan1.0" => TargetEnv::Vulkan_1_0,
            "vulkan1.1" => TargetEnv::Vulkan_1_1,
            "vulkan1.1spv1.4" => TargetEnv::Vulkan_1_1_Spirv_1_4,
            "vulkan1.2" => TargetEnv::Vulkan_1_2,
            "vulkan1.3" => TargetEnv::Vulkan_1_3,
            "universal1.0" => TargetEnv::Universal_1_0,
            "universal1.1" => TargetEnv::Universal_1_1,
            "universal1.2" => TargetEnv::Universal_1_2,
            "universal1.3" => TargetEnv::Universal_1_3,
            "universal1.4" => TargetEnv::Universal_1_4,
            "universal1.5" => TargetEnv::Universal_1_5,
            "universal1.6" => TargetEnv::Universal_1_6,
            other => {
                return Err(HarnessError::UnknownSetting {
                    kind: "SPIR-V target environment",
                    value: other.to_owned(),
                });
            }
        })
    }
}
