use std::path::PathBuf;

/// GFX 层的可恢复错误
///
/// 仅覆盖初始化阶段的可检查失败；设备创建成功之后的 Vulkan
/// 对象创建失败属于不可恢复错误，直接 panic 终止进程。
#[derive(Debug, thiserror::Error)]
pub enum GfxError {
    /// 没有任何一张显卡满足必要的 capability 集合
    #[error("no physical device satisfies the required capability set")]
    NoSuitableDevice,

    /// 请求的 queue family 从未被解析出来
    #[error("queue family for role `{0}` was never resolved")]
    QueueFamilyMissing(&'static str),

    /// shader spv 文件读取失败
    #[error("failed to read shader artifact {path}")]
    ShaderArtifact {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// shader 反射 sidecar 解析失败
    #[error("failed to parse shader reflection sidecar {path}")]
    ShaderReflection {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
