//! Names of IRC numeric replies
//!
//! Used to label numerics the dispatcher has no handler for, so consumers can still tell
//! what arrived.

/// Parse a three-digit numeric command
pub fn parse_numeric(code: &str) -> Option<u16> {
    if code.len() == 3 && code.bytes().all(|b| b.is_ascii_digit()) {
        code.parse().ok()
    } else {
        None
    }
}

/// Conventional lower-case name of a numeric, or `"Unknown"`
pub fn numeric_name(code: u16) -> &'static str {
    match code {
        // Registration and server maps
        1 => "welcome",
        2 => "yourhost",
        3 => "created",
        4 => "myinfo",
        5 => "map",
        6 => "mapmore",
        7 => "mapend",
        8 => "snomask",
        9 => "statmemtot",
        10 => "statmem",
        // Trace and stats
        200 => "tracelink",
        201 => "traceconnecting",
        202 => "tracehandshake",
        203 => "traceunknown",
        204 => "traceoperator",
        205 => "traceuser",
        206 => "traceserver",
        207 => "traceservice",
        208 => "tracenewtype",
        209 => "traceclass",
        210 => "tracereconnect",
        211 => "statslinkinfo",
        212 => "statscommands",
        213 => "statscline",
        214 => "statsnline",
        215 => "statsiline",
        216 => "statskline",
        217 => "statsqline",
        218 => "statsyline",
        219 => "endofstats",
        220 => "statsbline",
        221 => "umodeis",
        222 => "sqline_nick",
        223 => "statsgline",
        224 => "statstline",
        225 => "statseline",
        226 => "statsnline",
        227 => "statsvline",
        231 => "serviceinfo",
        232 => "endofservices",
        233 => "service",
        234 => "servlist",
        235 => "servlistend",
        241 => "statslline",
        242 => "statsuptime",
        243 => "statsoline",
        244 => "statshline",
        245 => "statssline",
        246 => "statstline",
        247 => "statsgline",
        248 => "statsuline",
        249 => "statsdebug",
        250 => "luserconns",
        251 => "luserclient",
        252 => "luserop",
        253 => "luserunknown",
        254 => "luserchannels",
        255 => "luserme",
        256 => "adminme",
        257 => "adminloc1",
        258 => "adminloc2",
        259 => "adminemail",
        261 => "tracelog",
        262 => "endoftrace",
        263 => "tryagain",
        265 => "n_local",
        266 => "n_global",
        271 => "silelist",
        272 => "endofsilelist",
        275 => "statsdline",
        280 => "glist",
        281 => "endofglist",
        290 => "helphdr",
        291 => "helpop",
        292 => "helptlr",
        293 => "helphlp",
        294 => "helpfwd",
        295 => "helpign",
        // Command replies
        300 => "none",
        301 => "away",
        302 => "userhost",
        303 => "ison",
        304 => "rpl_text",
        305 => "unaway",
        306 => "nowaway",
        307 => "userip",
        308 => "rulesstart",
        309 => "endofrules",
        310 => "whoishelp",
        311 => "whoisuser",
        312 => "whoisserver",
        313 => "whoisoperator",
        314 => "whowasuser",
        315 => "endofwho",
        316 => "whoischanop",
        317 => "whoisidle",
        318 => "endofwhois",
        319 => "whoischannels",
        320 => "whoisvworld",
        321 => "liststart",
        322 => "list",
        323 => "listend",
        324 => "channelmodeis",
        329 => "channelcreate",
        331 => "notopic",
        332 => "topic",
        333 => "topicinfo",
        334 => "listusage",
        335 => "whoisbot",
        341 => "inviting",
        342 => "summoning",
        346 => "invitelist",
        347 => "endofinvitelist",
        348 => "exlist",
        349 => "endofexlist",
        351 => "version",
        352 => "whoreply",
        353 => "namreply",
        354 => "whospcrpl",
        361 => "killdone",
        362 => "closing",
        363 => "closeend",
        364 => "links",
        365 => "endoflinks",
        366 => "endofnames",
        367 => "banlist",
        368 => "endofbanlist",
        369 => "endofwhowas",
        371 => "info",
        372 => "motd",
        373 => "infostart",
        374 => "endofinfo",
        375 => "motdstart",
        376 => "endofmotd",
        377 => "motd2",
        378 => "austmotd",
        379 => "whoismodes",
        381 => "youreoper",
        382 => "rehashing",
        383 => "youreservice",
        384 => "myportis",
        385 => "notoperanymore",
        386 => "qlist",
        387 => "endofqlist",
        388 => "alist",
        389 => "endofalist",
        391 => "time",
        392 => "usersstart",
        393 => "users",
        394 => "endofusers",
        395 => "nousers",
        // Errors
        401 => "nosuchnick",
        402 => "nosuchserver",
        403 => "nosuchchannel",
        404 => "cannotsendtochan",
        405 => "toomanychannels",
        406 => "wasnosuchnick",
        407 => "toomanytargets",
        408 => "nosuchservice",
        409 => "noorigin",
        411 => "norecipient",
        412 => "notexttosend",
        413 => "notoplevel",
        414 => "wildtoplevel",
        416 => "querytoolong",
        421 => "unknowncommand",
        422 => "nomotd",
        423 => "noadmininfo",
        424 => "fileerror",
        425 => "noopermotd",
        431 => "nonicknamegiven",
        432 => "erroneusnickname",
        433 => "nicknameinuse",
        434 => "norules",
        435 => "serviceconfused",
        436 => "nickcollision",
        437 => "bannickchange",
        438 => "nicktoofast",
        439 => "targettoofast",
        440 => "servicesdown",
        441 => "usernotinchannel",
        442 => "notonchannel",
        443 => "useronchannel",
        444 => "nologin",
        445 => "summondisabled",
        446 => "usersdisabled",
        447 => "nonickchange",
        451 => "notregistered",
        455 => "hostilename",
        459 => "nohiding",
        460 => "notforhalfops",
        461 => "needmoreparams",
        462 => "alreadyregistered",
        463 => "nopermforhost",
        464 => "passwdmismatch",
        465 => "yourebannedcreep",
        466 => "youwillbebanned",
        467 => "keyset",
        468 => "invalidusername",
        469 => "linkset",
        470 => "linkchannel",
        471 => "channelisfull",
        472 => "unknownmode",
        473 => "inviteonlychan",
        474 => "bannedfromchan",
        475 => "badchannelkey",
        476 => "badchanmask",
        477 => "needreggednick",
        478 => "banlistfull",
        479 => "secureonlychannel",
        480 => "cannotknock",
        481 => "noprivileges",
        482 => "chanoprivsneeded",
        483 => "cantkillserver",
        484 => "ischanservice",
        485 => "killdeny",
        486 => "htmdisabled",
        489 => "secureonlychan",
        491 => "nooperhost",
        492 => "noservicehost",
        501 => "umodeunknownflag",
        502 => "usersdontmatch",
        511 => "silelistfull",
        513 => "badping",
        518 => "noinvite",
        519 => "admonly",
        520 => "operonly",
        521 => "listsyntax",
        524 => "operspverify",
        // Watch list and extensions
        600 => "rpl_logon",
        601 => "rpl_logoff",
        602 => "rpl_watchoff",
        603 => "rpl_watchstat",
        604 => "rpl_nowon",
        605 => "rpl_nowoff",
        606 => "rpl_watchlist",
        607 => "rpl_endofwatchlist",
        610 => "mapmore",
        640 => "rpl_dumping",
        641 => "rpl_dumprpl",
        642 => "rpl_eodump",
        671 => "whoissecure",
        999 => "numericerror",
        _ => "Unknown",
    }
}
