//! Element and attribute names of the XML configuration document
//!
//! ```xml
//! <StoredConfiguration createTime=".." modifyTime=".." xmlVersion="5">
//!   <properties type="config">
//!     <property key="schemaVersion">5</property>
//!   </properties>
//!   <settings>
//!     <setting key="display.title" syntax="STRING" domain="system" modifyTime=".." user="admin">
//!       <label>Site Title</label>
//!       <value>Acme</value>
//!     </setting>
//!   </settings>
//!   <localeBundle bundle="Display" key="Welcome" domain="system">
//!     <value locale="de">Willkommen</value>
//!   </localeBundle>
//! </StoredConfiguration>
//! ```

pub const ROOT: &str = "StoredConfiguration";
pub const PROPERTIES: &str = "properties";
pub const PROPERTY: &str = "property";
pub const SETTINGS: &str = "settings";
pub const SETTING: &str = "setting";
pub const LOCALE_BUNDLE: &str = "localeBundle";
pub const LABEL: &str = "label";
pub const DEFAULT: &str = "default";
pub const VALUE: &str = crate::value::VALUE_ELEMENT;

pub const ATTR_CREATE_TIME: &str = "createTime";
pub const ATTR_MODIFY_TIME: &str = "modifyTime";
pub const ATTR_XML_VERSION: &str = "xmlVersion";
pub const ATTR_TYPE: &str = "type";
pub const ATTR_KEY: &str = "key";
pub const ATTR_SYNTAX: &str = "syntax";
pub const ATTR_DOMAIN: &str = "domain";
pub const ATTR_PROFILE: &str = "profile";
pub const ATTR_BUNDLE: &str = "bundle";
pub const ATTR_USER: &str = "user";
pub const ATTR_USER_PROFILE: &str = "userProfile";
pub const ATTR_USER_DOMAIN: &str = "userDomain";

/// `type` of the block holding config properties
pub const PROPERTIES_CONFIG: &str = "config";
/// `type` of legacy application property blocks
pub const PROPERTIES_APP: &str = "app";

/// Document layout version written by this crate
pub const XML_VERSION: &str = "5";
