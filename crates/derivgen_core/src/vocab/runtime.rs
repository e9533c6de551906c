//! Names of the runtime APIs that generated text calls into.
//!
//! The generator never implements these; it only references them. Keeping every spelling here means a
//! rename on the runtime side is a one-line change.

/// `Medicine.TrackedInstances<T>`: the enumerable returned by `T.Instances`.
pub const TRACKED_INSTANCES: &str = "Medicine.TrackedInstances";

/// Instance registry for tracked type `T`.
pub const STORAGE_INSTANCES: &str = "global::Medicine.Internal.Storage.Instances";

/// Singleton slot for type `T`.
pub const STORAGE_SINGLETON: &str = "global::Medicine.Internal.Storage.Singleton";

/// Parallel unmanaged payload arrays keyed by `<T, TData>`.
pub const STORAGE_UNMANAGED: &str = "global::Medicine.Internal.Storage.UnmanagedData";

/// Id lookup table keyed by `<T, TId>`.
pub const STORAGE_LOOKUP_BY_ID: &str = "global::Medicine.Internal.Storage.LookupByID";

/// User-provided storage keyed by `<T, TStorage>`.
pub const STORAGE_CUSTOM: &str = "global::Medicine.Internal.Storage.Custom";

/// Transform access array for tracked type `T`.
pub const STORAGE_TRANSFORMS: &str = "global::Medicine.Internal.Storage.TransformAccess";

/// Instance-id array for tracked type `T`.
pub const STORAGE_INSTANCE_IDS: &str = "global::Medicine.Internal.Storage.InstanceIDs";

/// Job-system view over the transforms of tracked type `T`.
pub const TRANSFORM_ACCESS_ARRAY: &str = "global::UnityEngine.Jobs.TransformAccessArray";

/// Native array type used for instance-id arrays.
pub const NATIVE_ARRAY: &str = "global::Unity.Collections.NativeArray";

/// Union helpers (`ThrowUnknownTypeID`).
pub const UNION_UTILITY: &str = "global::Medicine.Internal.UnionUtility";

/// Reinterpret-cast helper used by union dispatch and header accessors.
pub const UNSAFE_AS: &str = "global::Unity.Collections.LowLevel.Unsafe.UnsafeUtility.As";

/// Raw reference wrapper used by unmanaged accessors.
pub const UNMANAGED_REF: &str = "global::Medicine.Internal.UnmanagedRef";

/// Field offset lookup used by unmanaged accessors.
pub const FIELD_OFFSET: &str = "global::Medicine.Internal.FieldOffset.Of";

/// Singleton conflict strategy enum.
pub const SINGLETON_STRATEGY: &str = "global::Medicine.SingletonStrategy";

/// Attribute applied to generated backing fields.
pub const NON_SERIALIZED: &str = "global::System.NonSerialized";

/// Attribute allowing struct members to return `ref this`.
pub const UNSCOPED_REF: &str = "global::System.Diagnostics.CodeAnalysis.UnscopedRef";

/// Attribute applied to generated hot-path accessors.
pub const AGGRESSIVE_INLINING: &str =
    "global::System.Runtime.CompilerServices.MethodImpl(global::System.Runtime.CompilerServices.MethodImplOptions.AggressiveInlining)";

/// Render `API<arg, ...>`.
pub fn generic(api: &str, args: &[&str]) -> String {
    format!("{api}<{}>", args.join(", "))
}
