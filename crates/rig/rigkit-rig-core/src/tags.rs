//! Reserved host tag keys, graph names, package idents and item-type idents.
//!
//! Tag keys starting with `RS` and graph names starting with `rs.` belong to
//! the rig system; standardisation strips both wholesale.

/// Rig-item type identifier.
pub const TAG_ITEM_TYPE: &str = "RSIT";
/// Optional item identifier, unique within a module.
pub const TAG_IDENT: &str = "RSID";
/// `;`-separated feature identifier list.
pub const TAG_FEATURES: &str = "RSIF";
/// Setup identifier on setup root and assembly.
pub const TAG_SETUP: &str = "RSST";
/// Preset-id on preset content roots.
pub const TAG_PRESET_ID: &str = "RSPI";
/// System version on module/rig roots.
pub const TAG_VERSION: &str = "RSVR";
/// JSON-encoded flat settings.
pub const TAG_SETTINGS: &str = "RSIS";
/// JSON-encoded grouped settings.
pub const TAG_SETTINGS_GROUPS: &str = "RSIG";
/// Drop-script name (host-facing, fires a scene event).
pub const TAG_DROP_SCRIPT: &str = "RSDS";
/// Item-command string fired on gesture.
pub const TAG_ITEM_COMMAND: &str = "RSIC";
/// Transform-link type on the driven item; consistent with `rs.xfrmLink`.
pub const TAG_LINK_TYPE: &str = "RSXL";

/// Reserved prefix: any tag key starting with this is rig-system metadata.
pub const RESERVED_TAG_PREFIX: &str = "RS";
/// Reserved prefix for rig-system item graphs.
pub const GRAPH_PREFIX: &str = "rs.";

pub const GRAPH_SETUP: &str = "rs.setup";
pub const GRAPH_KEY_ITEMS: &str = "rs.keyItems";
pub const GRAPH_ITEM_LINK: &str = "rs.itemLink";
pub const GRAPH_SYMMETRY: &str = "rs.symmetry";
pub const GRAPH_XFRM_LINK: &str = "rs.xfrmLink";
pub const GRAPH_PLUG_SOCKET: &str = "rs.plugSocket";
pub const GRAPH_GUIDE: &str = "rs.guide";
pub const GRAPH_MATCH_REF: &str = "rs.matchRef";
pub const GRAPH_META_GROUP: &str = "rs.metaGroup";
pub const GRAPH_CHAIN: &str = "rs.ikfkChain";
pub const GRAPH_CHAIN_FK: &str = "rs.ikfkFk";
pub const GRAPH_CHAIN_IK: &str = "rs.ikfkIk";
pub const GRAPH_CHAIN_DRIVERS: &str = "rs.ikfkDrivers";
pub const GRAPH_CHAIN_BLEND: &str = "rs.ikfkBlend";
pub const GRAPH_IK_TARGET: &str = "rs.ikTarget";
pub const GRAPH_IK_TARGET_REF: &str = "rs.ikTargetRef";
pub const GRAPH_IK_GOAL_REF: &str = "rs.ikGoalRef";
pub const GRAPH_IK_JOINTS: &str = "rs.ikJoints";

/// Drop-script tag values the host fires as scene events.
pub const DROP_MODULE: &str = "rs_drop_module";
pub const DROP_MODULE_SET: &str = "rs_drop_module_set";
pub const DROP_PIECE: &str = "rs_drop_piece";
pub const DROP_PRESET: &str = "rs_drop_preset";

// Rig item type identifiers used by the core itself. Concrete body parts
// define more; these are the structural ones.
pub const TYPE_RIG_ROOT: &str = "rigRoot";
pub const TYPE_MODULE_ROOT: &str = "moduleRoot";
pub const TYPE_FOLDER: &str = "folder";
pub const TYPE_CONTROLLER: &str = "ctrl";
pub const TYPE_CONTROLLER_GUIDE: &str = "ctrlGuide";
pub const TYPE_GUIDE: &str = "guide";
pub const TYPE_PLUG: &str = "plug";
pub const TYPE_SOCKET: &str = "socket";
pub const TYPE_BIND_LOCATOR: &str = "bindloc";
pub const TYPE_BIND_MESH: &str = "bindmesh";
pub const TYPE_RIGID_MESH: &str = "rigidmesh";
pub const TYPE_BIND_PROXY: &str = "bindproxy";
pub const TYPE_DECORATOR: &str = "decorator";
pub const TYPE_PIECE_ROOT: &str = "pieceRoot";
pub const TYPE_CHAIN_GROUP: &str = "chainGroup";
pub const TYPE_MIRROR_GROUP: &str = "mirrorChannels";
pub const TYPE_PRESET_CONTENT: &str = "presetContent";

// Well-known module folder identifiers.
pub const FOLDER_GUIDE: &str = "fldGuide";
pub const FOLDER_EDIT_GUIDE: &str = "fldEditGuide";
pub const FOLDER_RIG: &str = "fldRig";
pub const FOLDER_BIND_SKELETON: &str = "fldBindSkel";

// Stable settings keys consumed by the core.
pub const SET_RES_LIST: &str = "meshres.list";
pub const SET_RES_CURRENT: &str = "meshres.current";
pub const SET_RES_MEMBER: &str = "meshres.member";
pub const SET_SUBMODULE: &str = "submid";
pub const SET_VARIANT: &str = "variant";
pub const SET_REF_SIZE: &str = "refsize";
pub const SET_DEFORM_ORDER: &str = "dfrms.order";
pub const SET_TRANS_DIR: &str = "trans.dir";
pub const SET_HIER_PARENT: &str = "hrchcnnct.parent";
pub const SET_HIER_CHILD: &str = "hrchcnnct.child";
pub const SET_CHAN_IN: &str = "chancnnct.in";
pub const SET_CHAN_OUT: &str = "chancnnct.out";
pub const SET_DROP_ACTION: &str = "drop.action";

/// Current system version written into `RSVR` on save.
pub const SYSTEM_VERSION: u32 = 3;

pub fn is_reserved_tag(key: &str) -> bool {
    key.starts_with(RESERVED_TAG_PREFIX)
}

pub fn is_rig_graph(name: &str) -> bool {
    name.starts_with(GRAPH_PREFIX)
}
